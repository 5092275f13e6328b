use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use crate::eeprom::ParallelPins;
use crate::gpio::{
	Gpio,
	Level,
	Mode,
	Pin,
};

use super::at28c64::At28c64Chip;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LineState {
	pub mode: Mode,
	/// output latch; only on the wire in `Mode::Output`
	pub level: Level,
}

impl LineState {
	/// state of a line nobody touched yet
	pub const FLOATING: LineState = LineState {
		mode: Mode::Input,
		level: Level::Low,
	};

	pub fn driven(level: Level) -> Self {
		LineState {
			mode: Mode::Output,
			level,
		}
	}

	/// level if driven by the controller
	pub fn driven_level(&self) -> Option<Level> {
		match self.mode {
			Mode::Output => Some(self.level),
			Mode::Input => None,
		}
	}
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Event {
	Mode(Pin, Mode),
	Write(Pin, Level),
	Delay(Duration),
	BusBegin(u32),
	BusEnd,
	BusWrite {
		address: u8,
		data: Vec<u8>,
		stop: bool,
	},
	BusRead {
		address: u8,
		len: usize,
	},
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Hazard {
	/// WE pulled low while the chip has no power
	WriteUnpowered,
	/// controller drives a data line while the chip outputs data
	BusContention(Pin),
}

pub(super) type Lines = BTreeMap<Pin, LineState>;

pub(super) fn line_state(lines: &Lines, pin: Pin) -> LineState {
	lines.get(&pin).cloned().unwrap_or(LineState::FLOATING)
}

#[derive(Default)]
struct Board {
	lines: Lines,
	trace: Vec<Event>,
	hazards: Vec<Hazard>,
	at28c64: Option<At28c64Chip>,
}

impl Board {
	fn update(&mut self, pin: Pin, f: impl FnOnce(&mut LineState)) {
		let before = line_state(&self.lines, pin);
		let mut after = before;
		f(&mut after);
		self.lines.insert(pin, after);

		if let Some(chip) = self.at28c64.as_mut() {
			chip.line_changed(&self.lines, pin, before, &mut self.hazards);
		}
	}
}

/// Handle to a simulated board; clones share the same board.
#[derive(Clone, Default)]
pub struct SimGpio(Rc<RefCell<Board>>);

impl SimGpio {
	pub fn new() -> Self {
		SimGpio::default()
	}

	pub fn attach_at28c64(&self, pins: ParallelPins) {
		self.0.borrow_mut().at28c64 = Some(At28c64Chip::new(pins));
	}

	pub fn line(&self, pin: Pin) -> LineState {
		line_state(&self.0.borrow().lines, pin)
	}

	/// state of every line touched so far
	pub fn lines(&self) -> BTreeMap<Pin, LineState> {
		self.0.borrow().lines.clone()
	}

	pub fn trace(&self) -> Vec<Event> {
		self.0.borrow().trace.clone()
	}

	pub fn clear_trace(&self) {
		self.0.borrow_mut().trace.clear();
	}

	pub fn hazards(&self) -> Vec<Hazard> {
		self.0.borrow().hazards.clone()
	}

	pub(super) fn record(&self, event: Event) {
		self.0.borrow_mut().trace.push(event);
	}

	/// address the shift registers present to the AT28C64 (if enabled)
	pub fn latched_address(&self) -> Option<u16> {
		let board = self.0.borrow();
		board.at28c64.as_ref().and_then(|chip| chip.latched_address(&board.lines))
	}

	pub fn is_at28c64_powered(&self) -> bool {
		let board = self.0.borrow();
		board.at28c64.as_ref().map_or(false, |chip| chip.is_powered(&board.lines))
	}

	/// memory content of the attached AT28C64
	pub fn peek_at28c64(&self, address: u16) -> Option<u8> {
		self.0.borrow().at28c64.as_ref().map(|chip| chip.peek(address))
	}

	pub fn poke_at28c64(&self, address: u16, value: u8) {
		if let Some(chip) = self.0.borrow_mut().at28c64.as_mut() {
			chip.poke(address, value);
		}
	}
}

impl Gpio for SimGpio {
	fn set_mode(&mut self, pin: Pin, mode: Mode) -> crate::AResult<()> {
		let mut board = self.0.borrow_mut();
		board.trace.push(Event::Mode(pin, mode));
		board.update(pin, |line| line.mode = mode);
		Ok(())
	}

	fn write(&mut self, pin: Pin, level: Level) -> crate::AResult<()> {
		let mut board = self.0.borrow_mut();
		board.trace.push(Event::Write(pin, level));
		board.update(pin, |line| line.level = level);
		Ok(())
	}

	fn read(&mut self, pin: Pin) -> crate::AResult<Level> {
		let board = self.0.borrow();
		let line = line_state(&board.lines, pin);
		if let Some(level) = line.driven_level() {
			return Ok(level);
		}
		let chip_level = board.at28c64.as_ref().and_then(|chip| chip.output(&board.lines, pin));
		Ok(chip_level.unwrap_or(Level::Low))
	}

	fn delay(&mut self, duration: Duration) {
		self.record(Event::Delay(duration));
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn untouched_lines_float() {
		let mut gpio = SimGpio::new();
		assert_eq!(gpio.line(Pin(3)), LineState::FLOATING);
		assert_eq!(gpio.read(Pin(3)).unwrap(), Level::Low);
		assert!(gpio.lines().is_empty());
	}

	#[test]
	fn input_keeps_output_latch() {
		let mut gpio = SimGpio::new();
		gpio.write(Pin(1), Level::High).unwrap();
		assert_eq!(gpio.line(Pin(1)).driven_level(), None);
		gpio.set_mode(Pin(1), Mode::Output).unwrap();
		assert_eq!(gpio.line(Pin(1)), LineState::driven(Level::High));
		assert_eq!(gpio.read(Pin(1)).unwrap(), Level::High);
	}

	#[test]
	fn clones_share_board() {
		let gpio = SimGpio::new();
		let mut other = gpio.clone();
		other.write(Pin(7), Level::High).unwrap();
		other.delay(Duration::from_millis(3));
		assert_eq!(gpio.trace(), vec![
			Event::Write(Pin(7), Level::High),
			Event::Delay(Duration::from_millis(3)),
		]);
		gpio.clear_trace();
		assert!(other.trace().is_empty());
	}
}
