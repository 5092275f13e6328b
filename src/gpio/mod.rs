//! Digital line controller
//!
//! Everything the EEPROM drivers need from the microcontroller (or the host
//! they run on): switching single lines between input and output, driving
//! and sampling levels, and blocking delays.
//!
//! `GpioExt` adds the composite operations (glitch-free output switching,
//! shifting a byte into a shift register) on top of any `Gpio`.

mod hardware;
mod shift;

pub use self::hardware::{
	Gpio,
	Level,
	Mode,
	Pin,
	reliable_sleep,
};

pub use self::shift::{
	BitOrder,
	GpioExt,
};
