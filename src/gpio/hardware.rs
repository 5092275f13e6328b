use std::fmt;
use std::thread;
use std::time::{
	Duration,
	Instant,
};

/// sleep for at least `duration`, even if woken up early
pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

/// Line number on the controller
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Pin(pub u8);

impl fmt::Display for Pin {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "pin {}", self.0)
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Level {
	Low,
	High,
}

impl Level {
	pub fn is_high(self) -> bool {
		self == Level::High
	}

	pub fn is_low(self) -> bool {
		self == Level::Low
	}
}

impl From<bool> for Level {
	fn from(v: bool) -> Self {
		match v {
			false => Level::Low,
			true => Level::High,
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Mode {
	/// high impedance; the line is not driven
	Input,
	Output,
}

pub trait Gpio {
	fn set_mode(&mut self, pin: Pin, mode: Mode) -> crate::AResult<()>;

	/// Set the output level of a line.
	///
	/// On an input line the level is remembered and driven once the line
	/// is switched to output.
	fn write(&mut self, pin: Pin, level: Level) -> crate::AResult<()>;

	fn read(&mut self, pin: Pin) -> crate::AResult<Level>;

	// block for (at least) `duration`
	fn delay(&mut self, duration: Duration) {
		reliable_sleep(duration);
	}
}

impl<'a, G: ?Sized + Gpio> Gpio for &'a mut G {
	fn set_mode(&mut self, pin: Pin, mode: Mode) -> crate::AResult<()> {
		G::set_mode(*self, pin, mode)
	}

	fn write(&mut self, pin: Pin, level: Level) -> crate::AResult<()> {
		G::write(*self, pin, level)
	}

	fn read(&mut self, pin: Pin) -> crate::AResult<Level> {
		G::read(*self, pin)
	}

	fn delay(&mut self, duration: Duration) {
		G::delay(*self, duration)
	}
}
