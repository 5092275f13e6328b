//! Microchip 24LCxx series (tested with 24LC32)
//!
//! Random read: write the 16-bit address (high byte first), repeated
//! start, read one byte.
//!
//! Byte write: address + data in one transaction; the chip ignores the
//! data while WP is high. One byte per transaction (page writes of up to
//! 32 bytes are not used).

use crate::gpio::{
	Gpio,
	GpioExt,
	Level,
	Mode,
	Pin,
};
use crate::twi::TwoWire;

use super::{
	EepromError,
	EepromIo,
	Phase,
};

/// 0b1010 followed by the chip select bits A2..A0 (all wired low)
pub const DEVICE_ADDRESS: u8 = 0x50;

pub const BUS_CLOCK_HZ: u32 = 400_000;

pub mod timing {
	use std::time::Duration;

	/// WP low until the bus transaction starts
	pub const WRITE_PROTECT_RELEASE: Duration = Duration::from_micros(1);
	/// after the write transaction, before raising WP again
	pub const WRITE_SETTLE: Duration = Duration::from_millis(5);
	/// after raising WP; also covers the rest of the internal write cycle
	pub const WRITE_PROTECT_RESTORE: Duration = Duration::from_millis(5);
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SerialPins {
	/// A0, A1, A2
	pub address_select: [Pin; 3],
	pub power: Pin,
	pub write_protect: Pin,
	pub scl: Pin,
	pub sda: Pin,
}

impl SerialPins {
	// reuses the IO lines at the bottom of the socket
	pub const DEFAULT: SerialPins = SerialPins {
		address_select: [Pin(12), Pin(13), Pin(14)],
		power: Pin(17),
		write_protect: Pin(16),
		scl: Pin(5),
		sda: Pin(6),
	};

	/// every line the driver touches
	pub fn all(&self) -> [Pin; 7] {
		[
			self.address_select[0],
			self.address_select[1],
			self.address_select[2],
			self.power,
			self.write_protect,
			self.scl,
			self.sda,
		]
	}
}

impl Default for SerialPins {
	fn default() -> Self {
		SerialPins::DEFAULT
	}
}

pub struct Mc24lcxx<G: Gpio, B: TwoWire> {
	gpio: G,
	bus: B,
	pins: SerialPins,
	bus_active: bool,
	phase: Phase,
}

impl<G: Gpio, B: TwoWire> Mc24lcxx<G, B> {
	pub fn new(gpio: G, bus: B) -> Self {
		Self::with_pins(gpio, bus, SerialPins::DEFAULT)
	}

	pub fn with_pins(gpio: G, bus: B, pins: SerialPins) -> Self {
		Mc24lcxx {
			gpio,
			bus,
			pins,
			bus_active: false,
			phase: Phase::Uninitialized,
		}
	}

	pub fn pins(&self) -> &SerialPins {
		&self.pins
	}

	pub fn is_bus_active(&self) -> bool {
		self.bus_active
	}

	pub fn into_inner(self) -> (G, B) {
		(self.gpio, self.bus)
	}

	fn open_write_window(&mut self) -> crate::AResult<WriteWindow<G, B>> {
		self.gpio.write(self.pins.write_protect, Level::Low)?;
		self.gpio.delay(timing::WRITE_PROTECT_RELEASE);
		Ok(WriteWindow(self, true))
	}

	fn close_write_window(&mut self) -> crate::AResult<()> {
		self.gpio.delay(timing::WRITE_SETTLE);
		self.gpio.write(self.pins.write_protect, Level::High)?;
		self.gpio.delay(timing::WRITE_PROTECT_RESTORE);
		Ok(())
	}
}

/// WP released while alive; `finish` (or drop) waits for the write and
/// protects the chip again
struct WriteWindow<'a, G: Gpio + 'a, B: TwoWire + 'a>(&'a mut Mc24lcxx<G, B>, bool);

impl<'a, G: Gpio, B: TwoWire> WriteWindow<'a, G, B> {
	fn send(&mut self, address: u16, value: u8) -> crate::AResult<()> {
		let data = [(address >> 8) as u8, address as u8, value];
		self.0.bus.write(DEVICE_ADDRESS, &data, true)
	}

	fn finish(mut self) -> crate::AResult<()> {
		self.1 = false;
		self.0.close_write_window()
	}
}

impl<'a, G: Gpio, B: TwoWire> Drop for WriteWindow<'a, G, B> {
	fn drop(&mut self) {
		if self.1 {
			if let Err(e) = self.0.close_write_window() {
				error!("Couldn't re-enable EEPROM write protection: {}", e);
			}
		}
	}
}

impl<G: Gpio, B: TwoWire> EepromIo for Mc24lcxx<G, B> {
	fn setup(&mut self) -> crate::AResult<()> {
		self.bus_active = false;
		self.disable()
	}

	fn init(&mut self) -> crate::AResult<()> {
		debug!("24LCxx: power on");
		self.gpio.output(self.pins.power, Level::High)?;
		self.gpio.output(self.pins.write_protect, Level::High)?;
		for &pin in &self.pins.address_select {
			self.gpio.output(pin, Level::Low)?;
		}

		self.bus.begin(BUS_CLOCK_HZ)?;
		self.bus_active = true;
		self.phase = Phase::Active;
		Ok(())
	}

	fn try_read_byte(&mut self, address: u16) -> crate::AResult<u8> {
		debug_assert_eq!(self.phase, Phase::Active, "24LCxx: read before init");

		self.bus.write(DEVICE_ADDRESS, &[(address >> 8) as u8, address as u8], false)?;

		let mut data = [0u8];
		if 0 == self.bus.read(DEVICE_ADDRESS, &mut data)? {
			return Err(EepromError::DeviceNotResponding.into());
		}
		trace!("24LCxx: read @{:04x}: {:02x}", address, data[0]);
		Ok(data[0])
	}

	fn write_byte(&mut self, address: u16, value: u8) -> crate::AResult<()> {
		debug_assert_eq!(self.phase, Phase::Active, "24LCxx: write before init");
		trace!("24LCxx: write @{:04x}: {:02x}", address, value);

		let mut window = self.open_write_window()?;
		window.send(address, value)?;
		window.finish()
	}

	fn disable(&mut self) -> crate::AResult<()> {
		// power goes off even if the bus didn't shut down cleanly
		let ended = if self.bus_active {
			self.bus.end()
		} else {
			Ok(())
		};
		self.bus_active = false;

		debug!("24LCxx: power off");
		self.gpio.write(self.pins.write_protect, Level::Low)?;
		self.gpio.write(self.pins.power, Level::Low)?;

		// no outputs
		self.gpio.set_modes(&self.pins.all(), Mode::Input)?;
		self.phase = Phase::Disabled;
		with_context!(("24LCxx: end bus"), ended)
	}

	fn phase(&self) -> Phase {
		self.phase
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::sim::{
		Event,
		LineState,
		SimGpio,
		SimTwoWire,
	};

	const PINS: SerialPins = SerialPins::DEFAULT;

	fn driver() -> (SimGpio, Mc24lcxx<SimGpio, SimTwoWire>) {
		let gpio = SimGpio::new();
		let bus = SimTwoWire::with_24lc32(gpio.clone(), PINS);
		(gpio.clone(), Mc24lcxx::new(gpio, bus))
	}

	fn active_driver() -> (SimGpio, Mc24lcxx<SimGpio, SimTwoWire>) {
		let (gpio, mut ee) = driver();
		ee.setup().unwrap();
		ee.init().unwrap();
		gpio.clear_trace();
		(gpio, ee)
	}

	#[test]
	fn init_powers_chip_write_protected() {
		let (gpio, mut ee) = driver();
		ee.setup().unwrap();
		ee.init().unwrap();

		assert_eq!(gpio.line(PINS.power), LineState::driven(Level::High));
		assert_eq!(gpio.line(PINS.write_protect), LineState::driven(Level::High));
		for &pin in &PINS.address_select {
			assert_eq!(gpio.line(pin), LineState::driven(Level::Low));
		}
		assert!(ee.is_bus_active());
		assert!(gpio.trace().contains(&Event::BusBegin(BUS_CLOCK_HZ)));
	}

	#[test]
	fn init_twice_reasserts_levels() {
		let (gpio, mut ee) = active_driver();
		let lines = gpio.lines();
		ee.init().unwrap();
		assert_eq!(gpio.lines(), lines);
		assert_eq!(ee.phase(), Phase::Active);
	}

	#[test]
	fn round_trip() {
		let (gpio, mut ee) = active_driver();
		for &(address, value) in &[(0x0000, 0x00), (0x0001, 0xff), (0x0abc, 0x42), (0x0fff, 0x80), (0x8000, 0x3c), (0xffff, 0xc3)] {
			ee.write_byte(address, value).unwrap();
			assert_eq!(ee.read_byte(address).unwrap(), value, "@{:04x}", address);
		}
		assert!(gpio.hazards().is_empty(), "{:?}", gpio.hazards());
	}

	#[test]
	fn read_uses_repeated_start() {
		let (gpio, mut ee) = active_driver();
		ee.read_byte(0x1234).unwrap();
		assert_eq!(gpio.trace(), vec![
			Event::BusWrite { address: DEVICE_ADDRESS, data: vec![0x12, 0x34], stop: false },
			Event::BusRead { address: DEVICE_ADDRESS, len: 1 },
		]);
	}

	#[test]
	fn read_leaves_lines_untouched() {
		let (gpio, mut ee) = active_driver();
		let lines = gpio.lines();
		ee.read_byte(0x0100).unwrap();
		assert_eq!(gpio.lines(), lines);
	}

	#[test]
	fn write_sequence() {
		let (gpio, mut ee) = active_driver();
		let lines = gpio.lines();
		ee.write_byte(0x0123, 0xab).unwrap();
		assert_eq!(gpio.trace(), vec![
			Event::Write(PINS.write_protect, Level::Low),
			Event::Delay(timing::WRITE_PROTECT_RELEASE),
			Event::BusWrite { address: DEVICE_ADDRESS, data: vec![0x01, 0x23, 0xab], stop: true },
			Event::Delay(timing::WRITE_SETTLE),
			Event::Write(PINS.write_protect, Level::High),
			Event::Delay(timing::WRITE_PROTECT_RESTORE),
		]);
		assert_eq!(gpio.lines(), lines);
	}

	#[test]
	fn failed_write_restores_write_protect() {
		let (gpio, mut ee) = active_driver();
		let lines = gpio.lines();
		ee.bus.set_responding(false);

		let e = ee.write_byte(0x0010, 0x77).unwrap_err();
		assert_eq!(EepromError::of(&e), Some(EepromError::DeviceNotResponding));
		assert_eq!(gpio.line(PINS.write_protect), LineState::driven(Level::High));
		assert_eq!(gpio.lines(), lines);
		assert!(gpio.trace().ends_with(&[
			Event::Delay(timing::WRITE_SETTLE),
			Event::Write(PINS.write_protect, Level::High),
			Event::Delay(timing::WRITE_PROTECT_RESTORE),
		]));
	}

	#[test]
	fn non_responding_device_reads_empty() {
		let gpio = SimGpio::new();
		let mut ee = Mc24lcxx::new(gpio.clone(), SimTwoWire::absent(gpio.clone()));
		ee.setup().unwrap();
		ee.init().unwrap();

		assert_eq!(ee.read_byte(0x0000).unwrap(), 0xff);
		assert_eq!(ee.read_byte(0x1234).unwrap(), 0xff);
		let e = ee.try_read_byte(0x1234).unwrap_err();
		assert_eq!(EepromError::of(&e), Some(EepromError::DeviceNotResponding));
	}

	#[test]
	fn disable_floats_all_lines() {
		let (gpio, mut ee) = active_driver();
		ee.disable().unwrap();

		for &pin in &PINS.all() {
			assert_eq!(gpio.line(pin).mode, Mode::Input, "{}", pin);
		}
		assert!(!ee.is_bus_active());
		assert_eq!(ee.phase(), Phase::Disabled);
		assert!(gpio.trace().contains(&Event::BusEnd));
	}

	/// bus that can't be released
	struct StuckBus(SimTwoWire);

	impl TwoWire for StuckBus {
		fn begin(&mut self, clock_hz: u32) -> crate::AResult<()> {
			self.0.begin(clock_hz)
		}

		fn end(&mut self) -> crate::AResult<()> {
			bail!("bus stuck")
		}

		fn write(&mut self, address: u8, data: &[u8], stop: bool) -> crate::AResult<()> {
			self.0.write(address, data, stop)
		}

		fn read(&mut self, address: u8, buf: &mut [u8]) -> crate::AResult<usize> {
			self.0.read(address, buf)
		}
	}

	#[test]
	fn disable_powers_off_when_bus_end_fails() {
		let gpio = SimGpio::new();
		let bus = StuckBus(SimTwoWire::with_24lc32(gpio.clone(), PINS));
		let mut ee = Mc24lcxx::new(gpio.clone(), bus);
		ee.init().unwrap();

		let e = ee.disable().unwrap_err();
		assert!(e.iter_chain().any(|cause| cause.to_string() == "bus stuck"), "{}", e);
		assert_eq!(gpio.line(PINS.power).driven_level(), None);
		assert_eq!(gpio.line(PINS.power).level, Level::Low);
		assert_eq!(gpio.line(PINS.write_protect).level, Level::Low);
		for &pin in &PINS.all() {
			assert_eq!(gpio.line(pin).mode, Mode::Input, "{}", pin);
		}
		assert!(!ee.is_bus_active());
		assert_eq!(ee.phase(), Phase::Disabled);

		// nothing left to end
		ee.disable().unwrap();
	}

	#[test]
	fn top_address_bits_go_on_the_bus() {
		let (gpio, mut ee) = active_driver();
		ee.read_byte(0xffff).unwrap();
		assert_eq!(gpio.trace()[0], Event::BusWrite { address: DEVICE_ADDRESS, data: vec![0xff, 0xff], stop: false });

		gpio.clear_trace();
		ee.write_byte(0x8001, 0x5a).unwrap();
		assert!(gpio.trace().contains(&Event::BusWrite { address: DEVICE_ADDRESS, data: vec![0x80, 0x01, 0x5a], stop: true }));
		assert_eq!(ee.read_byte(0x8001).unwrap(), 0x5a);
	}

	#[test]
	fn disable_is_idempotent() {
		let (gpio, mut ee) = active_driver();
		ee.disable().unwrap();
		let lines = gpio.lines();
		gpio.clear_trace();

		ee.disable().unwrap();
		assert_eq!(gpio.lines(), lines);
		// bus isn't ended a second time
		assert!(!gpio.trace().contains(&Event::BusEnd));
	}

	#[test]
	fn disable_before_init() {
		let (gpio, mut ee) = driver();
		ee.disable().unwrap();
		assert!(!gpio.trace().contains(&Event::BusEnd));
		assert_eq!(ee.phase(), Phase::Disabled);
	}

	#[test]
	fn setup_matches_disable_on_fresh_backend() {
		let (setup_gpio, mut a) = driver();
		a.setup().unwrap();
		let (disable_gpio, mut b) = driver();
		b.disable().unwrap();
		assert_eq!(setup_gpio.lines(), disable_gpio.lines());
	}

	#[test]
	fn write_protected_chip_keeps_data() {
		let (gpio, mut ee) = active_driver();
		ee.write_byte(0x0040, 0x11).unwrap();

		// write behind the driver's back while WP is still high
		ee.bus.write(DEVICE_ADDRESS, &[0x00, 0x40, 0x22], true).unwrap();
		assert_eq!(ee.read_byte(0x0040).unwrap(), 0x11);
		assert!(gpio.line(PINS.write_protect).level.is_high());
	}

	#[cfg(debug_assertions)]
	#[test]
	#[should_panic(expected = "read before init")]
	fn read_before_init_panics_in_debug() {
		let (_gpio, mut ee) = driver();
		ee.setup().unwrap();
		let _ = ee.read_byte(0x0000);
	}
}
