//! Byte-stream command protocol between a host and the programmer
//!
//! Commands (host to programmer):
//! - `'d' <type id>`: select the EEPROM type and power it up
//! - `'r' <page>`: read a page; answered with the 256 data bytes
//! - `'w' <page> <256 bytes>`: write a page; answered with `WRITE_ACK`
//!   (or `WRITE_NAK` if the write failed)
//! - `'q'`: power down the selected EEPROM
//!
//! The selected EEPROM is also powered down when the stream ends.

use std::io::{
	self,
	Read,
	Write,
};

use crate::eeprom::{
	self,
	Eeprom,
	EepromIo,
};
use crate::gpio::Gpio;
use crate::pages::{
	self,
	Page,
	PageIo,
	PAGE_SIZE,
};
use crate::twi::TwoWire;
use crate::variant::{
	EepromType,
	EepromVariant,
};

pub const CMD_DEVICE: u8 = b'd';
pub const CMD_READ: u8 = b'r';
pub const CMD_WRITE: u8 = b'w';
pub const CMD_QUIT: u8 = b'q';

pub const WRITE_ACK: u8 = 0xa5;
pub const WRITE_NAK: u8 = 0x00;

// `None` on a clean end of stream
fn read_command<R: Read + ?Sized>(stream: &mut R) -> io::Result<Option<u8>> {
	let mut buf = [0u8; 1];
	loop {
		match stream.read(&mut buf) {
			Ok(0) => return Ok(None),
			Ok(_) => return Ok(Some(buf[0])),
			Err(ref e) if e.kind() == io::ErrorKind::Interrupted => (),
			Err(e) => return Err(e),
		}
	}
}

fn read_u8<R: Read + ?Sized>(stream: &mut R) -> io::Result<u8> {
	let mut buf = [0u8; 1];
	stream.read_exact(&mut buf)?;
	Ok(buf[0])
}

fn read_eeprom_type<R: Read + ?Sized>(stream: &mut R) -> crate::AResult<EepromType> {
	let id = read_u8(stream)?;
	EepromType::from_id(id).ok_or_else(|| format_err!("unknown EEPROM type id {}", id))
}

enum SessionEnd {
	Quit,
	EndOfStream,
	Select(EepromType),
}

/// Programmer side: owns the GPIO lines and the 2-wire bus and runs the
/// selected driver on behalf of the host.
pub struct Programmer<G: Gpio, B: TwoWire> {
	gpio: G,
	bus: B,
}

impl<G: Gpio, B: TwoWire> Programmer<G, B> {
	/// Brings the lines of all EEPROM types into their safe state.
	pub fn new(gpio: G, bus: B) -> crate::AResult<Self> {
		let mut programmer = Programmer { gpio, bus };
		eeprom::setup_all(&mut programmer.gpio, &mut programmer.bus)?;
		Ok(programmer)
	}

	pub fn into_inner(self) -> (G, B) {
		(self.gpio, self.bus)
	}

	/// Handle commands until the stream ends.
	pub fn serve<S: Read + Write + ?Sized>(&mut self, stream: &mut S) -> crate::AResult<()> {
		let mut selected = None;
		loop {
			let eeprom_type = match selected.take() {
				Some(eeprom_type) => eeprom_type,
				None => match read_command(stream)? {
					None => return Ok(()),
					Some(CMD_DEVICE) => read_eeprom_type(stream)?,
					Some(CMD_QUIT) => continue,
					Some(cmd @ CMD_READ) | Some(cmd @ CMD_WRITE) => {
						bail!("command {:?} without selected EEPROM", cmd as char);
					},
					Some(cmd) => {
						warn!("ignoring unknown command 0x{:02x}", cmd);
						continue;
					},
				},
			};

			match self.session(stream, eeprom_type)? {
				SessionEnd::Quit => (),
				SessionEnd::EndOfStream => return Ok(()),
				SessionEnd::Select(next) => selected = Some(next),
			}
		}
	}

	fn session<S: Read + Write + ?Sized>(&mut self, stream: &mut S, eeprom_type: EepromType) -> crate::AResult<SessionEnd> {
		info!("selected {}", eeprom_type);
		let mut ee = Eeprom::new(eeprom_type, &mut self.gpio, &mut self.bus);
		let result = ee.init().and_then(|()| {
			serve_session(&mut ee, eeprom_type.address_space(), stream)
		});
		let disabled = ee.disable();
		debug!("disabled {}", eeprom_type);
		let end = result?;
		disabled?;
		Ok(end)
	}
}

fn serve_session<E, S>(ee: &mut E, capacity: usize, stream: &mut S) -> crate::AResult<SessionEnd>
where
	E: EepromIo + ?Sized,
	S: Read + Write + ?Sized,
{
	loop {
		let cmd = match read_command(stream)? {
			None => return Ok(SessionEnd::EndOfStream),
			Some(cmd) => cmd,
		};
		match cmd {
			CMD_READ => {
				let page = read_u8(stream)?;
				let data = with_context!(("reading page {}", page),
					pages::read_page(ee, capacity, page)
				)?;
				stream.write_all(&data)?;
				stream.flush()?;
			},
			CMD_WRITE => {
				let page = read_u8(stream)?;
				let mut data = [0u8; PAGE_SIZE];
				stream.read_exact(&mut data)?;
				let ack = match pages::write_page(ee, capacity, page, &data) {
					Ok(()) => WRITE_ACK,
					Err(e) => {
						error!("writing page {} failed: {}", page, e);
						WRITE_NAK
					},
				};
				stream.write_all(&[ack])?;
				stream.flush()?;
			},
			CMD_DEVICE => return Ok(SessionEnd::Select(read_eeprom_type(stream)?)),
			CMD_QUIT => return Ok(SessionEnd::Quit),
			_ => warn!("ignoring unknown command 0x{:02x}", cmd),
		}
	}
}

/// Host side of the protocol; powers the EEPROM down when dropped.
pub struct Client<S: Read + Write> {
	stream: S,
	variant: EepromVariant,
}

impl<S: Read + Write> Client<S> {
	pub fn open(mut stream: S, variant: EepromVariant) -> crate::AResult<Self> {
		stream.write_all(&[CMD_DEVICE, variant.eeprom_type().id()])?;
		stream.flush()?;
		Ok(Client { stream, variant })
	}

	pub fn variant(&self) -> EepromVariant {
		self.variant
	}

	fn check_page(&self, page: u8) -> crate::AResult<()> {
		ensure!((page as usize) < self.page_count(), "page {} beyond {}", page, self.variant);
		Ok(())
	}

	fn quit(&mut self) -> crate::AResult<()> {
		self.stream.write_all(&[CMD_QUIT])?;
		self.stream.flush()?;
		Ok(())
	}
}

impl<S: Read + Write> PageIo for Client<S> {
	fn page_count(&self) -> usize {
		pages::page_count(self.variant.capacity())
	}

	fn read_page(&mut self, page: u8) -> crate::AResult<Page> {
		self.check_page(page)?;
		self.stream.write_all(&[CMD_READ, page])?;
		self.stream.flush()?;
		let mut data = [0u8; PAGE_SIZE];
		with_context!(("reading page {}", page), Ok(self.stream.read_exact(&mut data)?))?;
		Ok(data)
	}

	fn write_page(&mut self, page: u8, data: &Page) -> crate::AResult<()> {
		self.check_page(page)?;
		self.stream.write_all(&[CMD_WRITE, page])?;
		self.stream.write_all(data)?;
		self.stream.flush()?;
		let ack = with_context!(("writing page {}", page), Ok(read_u8(&mut self.stream)?))?;
		ensure!(ack == WRITE_ACK, "programmer failed to write page {} (answer 0x{:02x})", page, ack);
		Ok(())
	}
}

impl<S: Read + Write> Drop for Client<S> {
	fn drop(&mut self) {
		if let Err(e) = self.quit() {
			error!("Failed to power down EEPROM: {}", e);
		}
	}
}
