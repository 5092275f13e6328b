//! Atmel AT28C64 (8K x 8 parallel EEPROM)
//!
//! The address pins are driven by two cascaded 8-bit shift registers
//! (high byte shifted first); their outputs are enabled through the
//! "shift enable" line. Data pins D0..D7 are wired to discrete lines.
//!
//! Control lines WE and OE are active low; so is the power enable line
//! (switches the chip's supply).

use crate::gpio::{
	BitOrder,
	Gpio,
	GpioExt,
	Level,
	Mode,
	Pin,
};

use super::{
	EepromIo,
	Phase,
};

pub mod timing {
	use std::time::Duration;

	/// after power on
	pub const POWER_UP: Duration = Duration::from_millis(100);
	/// data bus lines settle (OE to valid data, data setup before WE)
	pub const BUS_SETTLE: Duration = Duration::from_micros(1);
	/// WE low pulse; the datasheet wants 100..1000 ns
	pub const WRITE_PULSE: Duration = Duration::from_micros(1);
	/// internal write cycle
	pub const WRITE_CYCLE: Duration = Duration::from_millis(10);
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ParallelPins {
	pub write_enable: Pin,
	pub output_enable: Pin,
	pub shift_clock: Pin,
	pub shift_data: Pin,
	pub shift_enable: Pin,
	pub power_enable: Pin,
	/// D0..D7
	pub data: [Pin; 8],
}

impl ParallelPins {
	pub const DEFAULT: ParallelPins = ParallelPins {
		write_enable: Pin(19),
		output_enable: Pin(20),
		shift_clock: Pin(8),
		shift_data: Pin(9),
		shift_enable: Pin(10),
		power_enable: Pin(21),
		data: [Pin(12), Pin(13), Pin(14), Pin(6), Pin(5), Pin(16), Pin(17), Pin(18)],
	};

	/// lines that stay driven while the chip is disabled
	pub fn latch(&self) -> [Pin; 4] {
		[self.power_enable, self.shift_enable, self.shift_clock, self.shift_data]
	}
}

impl Default for ParallelPins {
	fn default() -> Self {
		ParallelPins::DEFAULT
	}
}

pub struct At28c64<G: Gpio> {
	gpio: G,
	pins: ParallelPins,
	phase: Phase,
}

impl<G: Gpio> At28c64<G> {
	pub fn new(gpio: G) -> Self {
		Self::with_pins(gpio, ParallelPins::DEFAULT)
	}

	pub fn with_pins(gpio: G, pins: ParallelPins) -> Self {
		At28c64 {
			gpio,
			pins,
			phase: Phase::Uninitialized,
		}
	}

	pub fn pins(&self) -> &ParallelPins {
		&self.pins
	}

	pub fn into_inner(self) -> G {
		self.gpio
	}

	fn set_address(&mut self, address: u16) -> crate::AResult<()> {
		let pins = self.pins;
		self.gpio.write(pins.shift_clock, Level::Low)?;
		self.gpio.shift_out(pins.shift_data, pins.shift_clock, BitOrder::MsbFirst, (address >> 8) as u8)?;
		self.gpio.shift_out(pins.shift_data, pins.shift_clock, BitOrder::MsbFirst, address as u8)
	}

	fn drive_data(&mut self, value: u8) -> crate::AResult<DataBusDriven<G>> {
		let data = self.pins.data;
		let guard = DataBusDriven(self, true);
		for (bit, &pin) in data.iter().enumerate() {
			guard.0.gpio.output(pin, Level::from(0 != value & (1 << bit)))?;
		}
		Ok(guard)
	}

	fn release_data(&mut self) -> crate::AResult<()> {
		let data = self.pins.data;
		self.gpio.set_modes(&data, Mode::Input)
	}

	fn pulse_write_enable(&mut self) -> crate::AResult<()> {
		self.gpio.write(self.pins.write_enable, Level::Low)?;
		self.gpio.delay(timing::WRITE_PULSE);
		self.gpio.write(self.pins.write_enable, Level::High)?;
		self.gpio.delay(timing::BUS_SETTLE);
		Ok(())
	}
}

/// data lines driven by us; switched back to input when released (or
/// dropped), so the chip can drive the bus again
struct DataBusDriven<'a, G: Gpio + 'a>(&'a mut At28c64<G>, bool);

impl<'a, G: Gpio> DataBusDriven<'a, G> {
	fn release(mut self) -> crate::AResult<()> {
		self.1 = false;
		self.0.release_data()
	}
}

impl<'a, G: Gpio> Drop for DataBusDriven<'a, G> {
	fn drop(&mut self) {
		if self.1 {
			if let Err(e) = self.0.release_data() {
				error!("Couldn't release AT28C64 data bus: {}", e);
			}
		}
	}
}

impl<G: Gpio> EepromIo for At28c64<G> {
	fn setup(&mut self) -> crate::AResult<()> {
		self.disable()
	}

	fn init(&mut self) -> crate::AResult<()> {
		debug!("AT28C64: power on");
		let pins = self.pins;
		self.gpio.output(pins.power_enable, Level::Low)?;

		// neither write nor read
		self.gpio.output(pins.write_enable, Level::High)?;
		self.gpio.output(pins.output_enable, Level::High)?;

		// address latch outputs on
		self.gpio.write(pins.shift_enable, Level::High)?;

		self.gpio.delay(timing::POWER_UP);
		self.phase = Phase::Active;
		Ok(())
	}

	fn try_read_byte(&mut self, address: u16) -> crate::AResult<u8> {
		debug_assert_eq!(self.phase, Phase::Active, "AT28C64: read before init");
		self.set_address(address)?;

		let pins = self.pins;
		self.gpio.write(pins.output_enable, Level::Low)?;
		self.gpio.delay(timing::BUS_SETTLE);

		let mut value = 0u8;
		for (bit, &pin) in pins.data.iter().enumerate() {
			if self.gpio.read(pin)?.is_high() {
				value |= 1 << bit;
			}
		}

		self.gpio.write(pins.output_enable, Level::High)?;
		self.gpio.delay(timing::BUS_SETTLE);

		trace!("AT28C64: read @{:04x}: {:02x}", address, value);
		Ok(value)
	}

	fn write_byte(&mut self, address: u16, value: u8) -> crate::AResult<()> {
		debug_assert_eq!(self.phase, Phase::Active, "AT28C64: write before init");
		trace!("AT28C64: write @{:04x}: {:02x}", address, value);
		self.set_address(address)?;

		let bus = self.drive_data(value)?;
		bus.0.gpio.delay(timing::BUS_SETTLE);
		bus.0.pulse_write_enable()?;
		bus.0.gpio.delay(timing::WRITE_CYCLE);
		bus.release()
	}

	fn disable(&mut self) -> crate::AResult<()> {
		debug!("AT28C64: power off");
		let pins = self.pins;
		// no power, no address data
		self.gpio.output(pins.power_enable, Level::High)?;
		self.gpio.output(pins.shift_enable, Level::Low)?;
		self.gpio.set_modes(&[pins.shift_clock, pins.shift_data], Mode::Output)?;

		// disable all possible outputs
		self.gpio.set_modes(&[pins.write_enable, pins.output_enable], Mode::Input)?;
		self.release_data()?;
		self.phase = Phase::Disabled;
		Ok(())
	}

	fn phase(&self) -> Phase {
		self.phase
	}
}
