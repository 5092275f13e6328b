/// 2-wire (I²C style) bus transport
///
/// Only the controller side is modeled; addresses are 7-bit, the R/W bit
/// is added by the transport.
pub trait TwoWire {
	/// start driving the bus at (at most) `clock_hz`
	fn begin(&mut self, clock_hz: u32) -> crate::AResult<()>;

	/// release the bus lines
	fn end(&mut self) -> crate::AResult<()>;

	/// Addressed write.
	///
	/// Without `stop` the bus is kept and the next transfer starts with a
	/// repeated start condition.
	///
	/// A NACK is reported as `EepromError::DeviceNotResponding`.
	fn write(&mut self, address: u8, data: &[u8], stop: bool) -> crate::AResult<()>;

	/// Addressed read (always ends with a stop condition).
	///
	/// Returns the number of bytes received; 0 if the device didn't answer.
	fn read(&mut self, address: u8, buf: &mut [u8]) -> crate::AResult<usize>;
}

impl<'a, B: ?Sized + TwoWire> TwoWire for &'a mut B {
	fn begin(&mut self, clock_hz: u32) -> crate::AResult<()> {
		B::begin(*self, clock_hz)
	}

	fn end(&mut self) -> crate::AResult<()> {
		B::end(*self)
	}

	fn write(&mut self, address: u8, data: &[u8], stop: bool) -> crate::AResult<()> {
		B::write(*self, address, data, stop)
	}

	fn read(&mut self, address: u8, buf: &mut [u8]) -> crate::AResult<usize> {
		B::read(*self, address, buf)
	}
}
