//! Simulated programmer board
//!
//! `SimGpio` stands in for the digital line controller: it keeps the
//! mode/level of every line, records everything the drivers do (line
//! changes, delays, bus transfers) in a trace, and doesn't actually
//! sleep. Chips can be attached to it:
//! - an AT28C64 on the parallel lines (`SimGpio::attach_at28c64`),
//!   including the address shift registers;
//! - a 24LCxx behind `SimTwoWire`, which looks at the power,
//!   write-protect and address select lines of the board.
//!
//! The AT28C64 model also watches for electrically bad states (see
//! `Hazard`).

mod at28c64;
mod board;
mod mc24lcxx;

pub use self::board::{
	Event,
	Hazard,
	LineState,
	SimGpio,
};

pub use self::mc24lcxx::SimTwoWire;
