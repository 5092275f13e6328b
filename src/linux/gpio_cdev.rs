use std::collections::BTreeMap;
use std::path::PathBuf;

use gpiocdev::chip::Chip;
use gpiocdev::line::{
	Offset,
	Value,
};
use gpiocdev::request::{
	Config,
	Request,
};

use crate::gpio::{
	Gpio,
	Level,
	Mode,
	Pin,
};

pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

const CONSUMER: &str = "eeprom-programmer";

fn to_value(level: Level) -> Value {
	match level {
		Level::Low => Value::Inactive,
		Level::High => Value::Active,
	}
}

fn to_level(value: Value) -> Level {
	match value {
		Value::Inactive => Level::Low,
		Value::Active => Level::High,
	}
}

fn line_offset(base: Offset, num_lines: u32, pin: Pin) -> crate::AResult<Offset> {
	let offset = base + pin.0 as Offset;
	ensure!(offset < num_lines, "{} maps to GPIO line {}, but the chip only has {} lines", pin, offset, num_lines);
	Ok(offset)
}

fn line_config(offset: Offset, mode: Mode, level: Level) -> Config {
	let mut config = Config::default();
	match mode {
		Mode::Input => config.with_line(offset).as_input(),
		// direction and level change together
		Mode::Output => config.with_line(offset).as_output(to_value(level)),
	};
	config
}

struct Line {
	request: Request,
	offset: Offset,
	mode: Mode,
	level: Level,
}

/// GPIO lines through the Linux GPIO character device.
///
/// `Pin(n)` maps to line `base + n` of the chip. Each line is requested
/// (as input) on first use; dropping switches all of them back to input
/// before releasing them.
pub struct CdevGpio {
	chip: PathBuf,
	base: Offset,
	num_lines: u32,
	lines: BTreeMap<Pin, Line>,
}

impl CdevGpio {
	pub fn open<P: Into<PathBuf>>(chip: P, base: Offset) -> crate::AResult<Self> {
		let chip = chip.into();
		let info = with_context!(("open GPIO chip {}", chip.display()), {
			Ok(Chip::from_path(&chip)?.info()?)
		})?;
		info!("GPIO chip {} ({}, {} lines), line 0 at offset {}", info.name, info.label, info.num_lines, base);
		Ok(CdevGpio {
			chip,
			base,
			num_lines: info.num_lines,
			lines: BTreeMap::new(),
		})
	}

	fn line(&mut self, pin: Pin) -> crate::AResult<&mut Line> {
		if !self.lines.contains_key(&pin) {
			let offset = line_offset(self.base, self.num_lines, pin)?;
			debug!("requesting GPIO line {} ({})", offset, pin);
			let chip = &self.chip;
			let request = with_context!(("request GPIO line {}", offset), {
				Ok(Request::from_config(line_config(offset, Mode::Input, Level::Low))
					.on_chip(chip)
					.with_consumer(CONSUMER)
					.request()?)
			})?;
			self.lines.insert(pin, Line {
				request,
				offset,
				mode: Mode::Input,
				level: Level::Low,
			});
		}
		self.lines.get_mut(&pin).ok_or_else(|| format_err!("GPIO {} not available", pin))
	}
}

impl Gpio for CdevGpio {
	fn set_mode(&mut self, pin: Pin, mode: Mode) -> crate::AResult<()> {
		let line = self.line(pin)?;
		if line.mode == mode {
			return Ok(());
		}
		let offset = line.offset;
		let config = line_config(offset, mode, line.level);
		with_context!(("switch GPIO line {} to {:?}", offset, mode), {
			line.request.reconfigure(&config)?;
			Ok(())
		})?;
		line.mode = mode;
		Ok(())
	}

	fn write(&mut self, pin: Pin, level: Level) -> crate::AResult<()> {
		let line = self.line(pin)?;
		line.level = level;
		if line.mode != Mode::Output {
			return Ok(());
		}
		let offset = line.offset;
		with_context!(("write GPIO line {}", offset), {
			line.request.set_value(offset, to_value(level))?;
			Ok(())
		})
	}

	fn read(&mut self, pin: Pin) -> crate::AResult<Level> {
		let line = self.line(pin)?;
		let offset = line.offset;
		let value = with_context!(("read GPIO line {}", offset), {
			Ok(line.request.value(offset)?)
		})?;
		Ok(to_level(value))
	}
}

impl Drop for CdevGpio {
	fn drop(&mut self) {
		for line in self.lines.values() {
			if line.mode == Mode::Input {
				continue;
			}
			if let Err(e) = line.request.reconfigure(&line_config(line.offset, Mode::Input, line.level)) {
				warn!("Failed to float GPIO line {}: {}", line.offset, e);
			}
		}
	}
}
