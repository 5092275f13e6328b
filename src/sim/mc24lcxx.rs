use crate::eeprom::{
	EepromError,
	SerialPins,
	DEVICE_ADDRESS,
};
use crate::gpio::Pin;
use crate::twi::TwoWire;

use super::board::{
	Event,
	SimGpio,
};

const MAX_CLOCK_HZ: u32 = 400_000;

/// 24LCxx with its power/WP/select lines wired to the board
struct Mc24lcxxChip {
	pins: SerialPins,
	memory: Vec<u8>,
	pointer: usize,
}

impl Mc24lcxxChip {
	fn is_high(board: &SimGpio, pin: Pin) -> bool {
		board.line(pin).driven_level().map_or(false, |level| level.is_high())
	}

	fn address(&self, board: &SimGpio) -> u8 {
		let mut address = DEVICE_ADDRESS & !0x07;
		for (bit, &pin) in self.pins.address_select.iter().enumerate() {
			if Self::is_high(board, pin) {
				address |= 1 << bit;
			}
		}
		address
	}

	fn acknowledges(&self, board: &SimGpio, address: u8) -> bool {
		Self::is_high(board, self.pins.power) && address == self.address(board)
	}

	// an undriven WP pin counts as low
	fn write_protected(&self, board: &SimGpio) -> bool {
		Self::is_high(board, self.pins.write_protect)
	}

	fn advance(&mut self) {
		self.pointer = (self.pointer + 1) % self.memory.len();
	}
}

/// 2-wire bus of the simulated board, optionally with a 24LCxx chip.
///
/// Transfers are recorded in the board's trace.
pub struct SimTwoWire {
	board: SimGpio,
	chip: Option<Mc24lcxxChip>,
	clock_hz: Option<u32>,
	responding: bool,
}

impl SimTwoWire {
	pub fn with_24lc32(board: SimGpio, pins: SerialPins) -> Self {
		Self::with_capacity(board, pins, 4096)
	}

	pub fn with_capacity(board: SimGpio, pins: SerialPins, capacity: usize) -> Self {
		assert!(capacity.is_power_of_two());
		SimTwoWire {
			board,
			chip: Some(Mc24lcxxChip {
				pins,
				// erased
				memory: vec![0xff; capacity],
				pointer: 0,
			}),
			clock_hz: None,
			responding: true,
		}
	}

	/// bus without any device
	pub fn absent(board: SimGpio) -> Self {
		SimTwoWire {
			board,
			chip: None,
			clock_hz: None,
			responding: true,
		}
	}

	/// a non-responding chip NACKs everything
	pub fn set_responding(&mut self, responding: bool) {
		self.responding = responding;
	}

	pub fn clock_hz(&self) -> Option<u32> {
		self.clock_hz
	}

	pub fn peek(&self, address: u16) -> Option<u8> {
		self.chip.as_ref().map(|chip| chip.memory[address as usize % chip.memory.len()])
	}

	fn chip_for(&mut self, address: u8) -> Option<&mut Mc24lcxxChip> {
		let board = &self.board;
		let responding = self.responding;
		self.chip.as_mut().filter(|chip| responding && chip.acknowledges(board, address))
	}
}

impl TwoWire for SimTwoWire {
	fn begin(&mut self, clock_hz: u32) -> crate::AResult<()> {
		self.board.record(Event::BusBegin(clock_hz));
		ensure!(clock_hz <= MAX_CLOCK_HZ, "bus clock {} Hz too fast for 24LCxx", clock_hz);
		self.clock_hz = Some(clock_hz);
		Ok(())
	}

	fn end(&mut self) -> crate::AResult<()> {
		self.board.record(Event::BusEnd);
		ensure!(self.clock_hz.is_some(), "2-wire bus not started");
		self.clock_hz = None;
		Ok(())
	}

	fn write(&mut self, address: u8, data: &[u8], stop: bool) -> crate::AResult<()> {
		self.board.record(Event::BusWrite { address, data: data.to_vec(), stop });
		ensure!(self.clock_hz.is_some(), "2-wire bus not started");

		let board = self.board.clone();
		let chip = match self.chip_for(address) {
			Some(chip) => chip,
			None => return Err(EepromError::DeviceNotResponding.into()),
		};

		if data.len() < 2 {
			return Ok(());
		}
		chip.pointer = (((data[0] as usize) << 8) | data[1] as usize) % chip.memory.len();

		let protected = chip.write_protected(&board);
		for &b in &data[2..] {
			if !protected {
				let pointer = chip.pointer;
				chip.memory[pointer] = b;
			}
			chip.advance();
		}
		Ok(())
	}

	fn read(&mut self, address: u8, buf: &mut [u8]) -> crate::AResult<usize> {
		self.board.record(Event::BusRead { address, len: buf.len() });
		ensure!(self.clock_hz.is_some(), "2-wire bus not started");

		let chip = match self.chip_for(address) {
			Some(chip) => chip,
			None => return Ok(0),
		};
		for b in buf.iter_mut() {
			*b = chip.memory[chip.pointer];
			chip.advance();
		}
		Ok(buf.len())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::gpio::{
		GpioExt,
		Level,
	};

	const PINS: SerialPins = SerialPins::DEFAULT;

	fn powered_bus() -> (SimGpio, SimTwoWire) {
		let mut gpio = SimGpio::new();
		gpio.output(PINS.power, Level::High).unwrap();
		let mut bus = SimTwoWire::with_24lc32(gpio.clone(), PINS);
		bus.begin(400_000).unwrap();
		(gpio, bus)
	}

	#[test]
	fn unpowered_chip_does_not_answer() {
		let gpio = SimGpio::new();
		let mut bus = SimTwoWire::with_24lc32(gpio, PINS);
		bus.begin(100_000).unwrap();
		let e = bus.write(DEVICE_ADDRESS, &[0, 0], false).unwrap_err();
		assert_eq!(EepromError::of(&e), Some(EepromError::DeviceNotResponding));
		assert_eq!(bus.read(DEVICE_ADDRESS, &mut [0u8; 1]).unwrap(), 0);
	}

	#[test]
	fn select_lines_change_address() {
		let (mut gpio, mut bus) = powered_bus();
		gpio.output(PINS.address_select[0], Level::High).unwrap();
		assert!(bus.write(DEVICE_ADDRESS, &[0, 0], true).is_err());
		assert!(bus.write(DEVICE_ADDRESS | 1, &[0, 0], true).is_ok());
	}

	#[test]
	fn sequential_read_advances() {
		let (_gpio, mut bus) = powered_bus();
		bus.write(DEVICE_ADDRESS, &[0x00, 0x10, 1, 2, 3], true).unwrap();
		bus.write(DEVICE_ADDRESS, &[0x00, 0x10], false).unwrap();
		let mut buf = [0u8; 4];
		assert_eq!(bus.read(DEVICE_ADDRESS, &mut buf).unwrap(), 4);
		assert_eq!(buf, [1, 2, 3, 0xff]);
	}

	#[test]
	fn bus_must_be_started() {
		let gpio = SimGpio::new();
		let mut bus = SimTwoWire::absent(gpio);
		assert!(bus.write(DEVICE_ADDRESS, &[0, 0], true).is_err());
		assert!(bus.end().is_err());
		assert!(bus.begin(1_000_000).is_err());
		assert_eq!(bus.clock_hz(), None);
	}

	#[test]
	fn addresses_wrap_at_capacity() {
		let (_gpio, mut bus) = powered_bus();
		bus.write(DEVICE_ADDRESS, &[0x10, 0x05, 0xaa], true).unwrap();
		assert_eq!(bus.peek(0x0005), Some(0xaa));
	}
}
