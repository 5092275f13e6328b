use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use crate::eeprom::EepromError;
use crate::twi::TwoWire;

/* see linux/i2c-dev.h and linux/i2c.h */

const I2C_RDWR: u32 = 0x0707;
const I2C_M_RD: u16 = 0x0001;

#[repr(C)]
struct I2cMsg {
	addr: u16,
	flags: u16,
	len: u16,
	buf: *mut u8,
}

#[repr(C)]
struct I2cRdwrIoctlData {
	msgs: *mut I2cMsg,
	nmsgs: u32,
}

fn message(address: u8, flags: u16, buf: &mut [u8]) -> I2cMsg {
	I2cMsg {
		addr: address as u16,
		flags,
		len: buf.len() as u16,
		buf: buf.as_mut_ptr(),
	}
}

// adapters report a missing ACK differently
fn is_nack(e: &io::Error) -> bool {
	match e.raw_os_error() {
		Some(libc::ENXIO) | Some(libc::EREMOTEIO) | Some(libc::EIO) => true,
		_ => false,
	}
}

fn bus_error(e: io::Error) -> failure::Error {
	if is_nack(&e) {
		EepromError::DeviceNotResponding.into()
	} else if e.raw_os_error() == Some(libc::ETIMEDOUT) {
		EepromError::BusTimeout.into()
	} else {
		e.into()
	}
}

/// 2-wire bus through `/dev/i2c-N`.
///
/// A write without stop condition is kept back and sent together with the
/// next transfer (combined transaction with repeated start), so a NACK of
/// such a write shows up as an empty read.
pub struct I2cDev {
	bus: u32,
	file: Option<fs::File>,
	pending: Option<(u8, Vec<u8>)>,
}

impl I2cDev {
	pub fn new(bus: u32) -> Self {
		I2cDev {
			bus,
			file: None,
			pending: None,
		}
	}

	pub fn path(&self) -> PathBuf {
		PathBuf::from(format!("/dev/i2c-{}", self.bus))
	}

	fn transfer(&self, msgs: &mut [I2cMsg]) -> crate::AResult<()> {
		let file = match &self.file {
			Some(file) => file,
			None => bail!("2-wire bus {} not started", self.path().display()),
		};
		let mut data = I2cRdwrIoctlData {
			msgs: msgs.as_mut_ptr(),
			nmsgs: msgs.len() as u32,
		};
		let res = unsafe {
			libc::ioctl(file.as_raw_fd(), I2C_RDWR as _, &mut data as *mut I2cRdwrIoctlData)
		};
		if res < 0 {
			return Err(bus_error(io::Error::last_os_error()));
		}
		Ok(())
	}

	fn flush_pending(&mut self) -> crate::AResult<()> {
		if let Some((address, mut data)) = self.pending.take() {
			self.transfer(&mut [message(address, 0, &mut data)])?;
		}
		Ok(())
	}
}

impl TwoWire for I2cDev {
	fn begin(&mut self, clock_hz: u32) -> crate::AResult<()> {
		let path = self.path();
		let file = with_context!(("open 2-wire bus {}", path.display()), {
			Ok(fs::OpenOptions::new().read(true).write(true).open(&path)?)
		})?;
		debug!("{}: clock set by the kernel driver ({} Hz requested)", path.display(), clock_hz);
		self.file = Some(file);
		self.pending = None;
		Ok(())
	}

	fn end(&mut self) -> crate::AResult<()> {
		let flushed = self.flush_pending();
		self.file = None;
		flushed
	}

	fn write(&mut self, address: u8, data: &[u8], stop: bool) -> crate::AResult<()> {
		self.flush_pending()?;
		if !stop {
			ensure!(self.file.is_some(), "2-wire bus {} not started", self.path().display());
			self.pending = Some((address, data.to_vec()));
			return Ok(());
		}
		let mut data = data.to_vec();
		self.transfer(&mut [message(address, 0, &mut data)])
	}

	fn read(&mut self, address: u8, buf: &mut [u8]) -> crate::AResult<usize> {
		let result = match self.pending.take() {
			Some((pending_address, mut data)) if pending_address == address => {
				self.transfer(&mut [
					message(address, 0, &mut data),
					message(address, I2C_M_RD, buf),
				])
			},
			pending => {
				self.pending = pending;
				self.flush_pending()?;
				self.transfer(&mut [message(address, I2C_M_RD, buf)])
			},
		};
		match result {
			Ok(()) => Ok(buf.len()),
			Err(ref e) if EepromError::of(e) == Some(EepromError::DeviceNotResponding) => Ok(0),
			Err(e) => Err(e),
		}
	}
}
