use super::{
	Gpio,
	Level,
	Mode,
	Pin,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BitOrder {
	MsbFirst,
	LsbFirst,
}

pub trait GpioExt: Gpio {
	// set the level first, so the line never drives its previous level
	fn output(&mut self, pin: Pin, level: Level) -> crate::AResult<()> {
		self.write(pin, level)?;
		self.set_mode(pin, Mode::Output)
	}

	fn set_modes(&mut self, pins: &[Pin], mode: Mode) -> crate::AResult<()> {
		for &pin in pins {
			self.set_mode(pin, mode)?;
		}
		Ok(())
	}

	/// Clock one byte into a shift register: each bit is put on `data`,
	/// then `clock` is pulsed high and back low.
	///
	/// `clock` must be low before the first bit.
	fn shift_out(&mut self, data: Pin, clock: Pin, order: BitOrder, value: u8) -> crate::AResult<()> {
		for i in 0..8 {
			let bit = match order {
				BitOrder::MsbFirst => 7 - i,
				BitOrder::LsbFirst => i,
			};
			self.write(data, Level::from(0 != value & (1 << bit)))?;
			self.write(clock, Level::High)?;
			self.write(clock, Level::Low)?;
		}
		Ok(())
	}
}

impl<G: Gpio + ?Sized> GpioExt for G {
}
