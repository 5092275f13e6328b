//! EEPROM drivers
//!
//! Two chip families are supported, with incompatible wiring:
//! - Microchip 24LCxx: 2-wire serial bus, device address 0x50 (select
//!   lines A0..A2 held low), plus power and write-protect lines.
//! - Atmel AT28C64: 8-bit parallel data bus, 16-bit address latched
//!   through two cascaded shift registers, WE/OE/power control lines.
//!
//! Lifecycle for both: `setup` once after boot, then any number of
//! `init` .. `read_byte`/`write_byte` .. `disable` cycles.

mod parallel;
mod serial;

pub use self::parallel::{
	At28c64,
	ParallelPins,
};

pub use self::serial::{
	BUS_CLOCK_HZ,
	DEVICE_ADDRESS,
	Mc24lcxx,
	SerialPins,
};

pub mod timing {
	pub use super::parallel::timing as parallel;
	pub use super::serial::timing as serial;
}

use failure::Fail;

use crate::gpio::Gpio;
use crate::twi::TwoWire;
use crate::variant::EepromType;

/// value `read_byte` reports for a device that didn't answer; same as an
/// erased cell
pub const EMPTY_READ: u8 = 0xff;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Fail)]
pub enum EepromError {
	#[fail(display = "EEPROM not responding")]
	DeviceNotResponding,

	#[fail(display = "bus timeout")]
	BusTimeout,

	#[fail(display = "address 0x{:x} out of range (capacity: 0x{:x} bytes)", address, capacity)]
	InvalidAddress {
		address: usize,
		capacity: usize,
	},
}

impl EepromError {
	pub fn of(e: &failure::Error) -> Option<EepromError> {
		e.downcast_ref::<EepromError>().cloned()
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Phase {
	Uninitialized,
	Active,
	Disabled,
}

pub trait EepromIo {
	/// Bring all lines into a safe state after boot; doesn't assume
	/// anything about the current state.
	fn setup(&mut self) -> crate::AResult<()>;

	/// Power the chip and make it addressable (writes stay blocked until
	/// `write_byte`). Can be repeated.
	fn init(&mut self) -> crate::AResult<()>;

	/// Read one byte; a device that doesn't answer results in
	/// `EepromError::DeviceNotResponding`.
	fn try_read_byte(&mut self, address: u16) -> crate::AResult<u8>;

	/// Read one byte; a device that doesn't answer reads as `EMPTY_READ`.
	fn read_byte(&mut self, address: u16) -> crate::AResult<u8> {
		match self.try_read_byte(address) {
			Err(ref e) if EepromError::of(e) == Some(EepromError::DeviceNotResponding) => {
				warn!("no data at 0x{:04x}, reading as 0x{:02x}", address, EMPTY_READ);
				Ok(EMPTY_READ)
			},
			r => r,
		}
	}

	/// Write one byte and wait for the write cycle to finish.
	fn write_byte(&mut self, address: u16, value: u8) -> crate::AResult<()>;

	/// Power off and release all lines; valid in every phase.
	fn disable(&mut self) -> crate::AResult<()>;

	fn phase(&self) -> Phase;
}

impl<'a, E: ?Sized + EepromIo> EepromIo for &'a mut E {
	fn setup(&mut self) -> crate::AResult<()> {
		E::setup(*self)
	}

	fn init(&mut self) -> crate::AResult<()> {
		E::init(*self)
	}

	fn try_read_byte(&mut self, address: u16) -> crate::AResult<u8> {
		E::try_read_byte(*self, address)
	}

	fn read_byte(&mut self, address: u16) -> crate::AResult<u8> {
		E::read_byte(*self, address)
	}

	fn write_byte(&mut self, address: u16, value: u8) -> crate::AResult<()> {
		E::write_byte(*self, address, value)
	}

	fn disable(&mut self) -> crate::AResult<()> {
		E::disable(*self)
	}

	fn phase(&self) -> Phase {
		E::phase(*self)
	}
}

/// One of the supported drivers
pub enum Eeprom<G: Gpio, B: TwoWire> {
	Parallel(At28c64<G>),
	Serial(Mc24lcxx<G, B>),
}

impl<G: Gpio, B: TwoWire> Eeprom<G, B> {
	/// driver for `eeprom_type` with the default wiring; the bus is only
	/// kept for the serial type
	pub fn new(eeprom_type: EepromType, gpio: G, bus: B) -> Self {
		match eeprom_type {
			EepromType::At28c64 => Eeprom::Parallel(At28c64::new(gpio)),
			EepromType::Mc24lcxx => Eeprom::Serial(Mc24lcxx::new(gpio, bus)),
		}
	}

	pub fn eeprom_type(&self) -> EepromType {
		match self {
			Eeprom::Parallel(_) => EepromType::At28c64,
			Eeprom::Serial(_) => EepromType::Mc24lcxx,
		}
	}
}

/// `setup` for every EEPROM type; their wirings share lines, so all of
/// them have to be brought into a safe state.
pub fn setup_all<G: Gpio, B: TwoWire>(gpio: &mut G, bus: &mut B) -> crate::AResult<()> {
	for &eeprom_type in &EepromType::ALL {
		with_context!(("setup for {}", eeprom_type),
			Eeprom::new(eeprom_type, &mut *gpio, &mut *bus).setup()
		)?;
	}
	Ok(())
}

impl<G: Gpio, B: TwoWire> EepromIo for Eeprom<G, B> {
	fn setup(&mut self) -> crate::AResult<()> {
		match self {
			Eeprom::Parallel(e) => e.setup(),
			Eeprom::Serial(e) => e.setup(),
		}
	}

	fn init(&mut self) -> crate::AResult<()> {
		match self {
			Eeprom::Parallel(e) => e.init(),
			Eeprom::Serial(e) => e.init(),
		}
	}

	fn try_read_byte(&mut self, address: u16) -> crate::AResult<u8> {
		match self {
			Eeprom::Parallel(e) => e.try_read_byte(address),
			Eeprom::Serial(e) => e.try_read_byte(address),
		}
	}

	fn write_byte(&mut self, address: u16, value: u8) -> crate::AResult<()> {
		match self {
			Eeprom::Parallel(e) => e.write_byte(address, value),
			Eeprom::Serial(e) => e.write_byte(address, value),
		}
	}

	fn disable(&mut self) -> crate::AResult<()> {
		match self {
			Eeprom::Parallel(e) => e.disable(),
			Eeprom::Serial(e) => e.disable(),
		}
	}

	fn phase(&self) -> Phase {
		match self {
			Eeprom::Parallel(e) => e.phase(),
			Eeprom::Serial(e) => e.phase(),
		}
	}
}
