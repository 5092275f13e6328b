//! Page-wise access on top of the byte operations
//!
//! A page is 256 bytes; page numbers are a single byte, which covers the
//! full 16-bit address range.

use crate::eeprom::{
	EepromError,
	EepromIo,
};

pub const PAGE_SIZE: usize = 256;

pub type Page = [u8; PAGE_SIZE];

/// value the last page of a short image gets padded with
pub const PADDING: u8 = 0x00;

fn page_address(capacity: usize, page: u8) -> crate::AResult<u16> {
	let address = page as usize * PAGE_SIZE;
	if address + PAGE_SIZE > capacity {
		return Err(EepromError::InvalidAddress {
			address,
			capacity,
		}.into());
	}
	Ok(address as u16)
}

pub fn page_count(capacity: usize) -> usize {
	capacity / PAGE_SIZE
}

pub fn read_page<E>(io: &mut E, capacity: usize, page: u8) -> crate::AResult<Page>
where
	E: EepromIo + ?Sized,
{
	let base = page_address(capacity, page)?;
	let mut buf = [0u8; PAGE_SIZE];
	for (offset, b) in buf.iter_mut().enumerate() {
		*b = io.read_byte(base + offset as u16)?;
	}
	Ok(buf)
}

pub fn write_page<E>(io: &mut E, capacity: usize, page: u8, data: &Page) -> crate::AResult<()>
where
	E: EepromIo + ?Sized,
{
	let base = page_address(capacity, page)?;
	debug!("writing page {} (@{:04x})", page, base);
	for (offset, &b) in data.iter().enumerate() {
		io.write_byte(base + offset as u16, b)?;
	}
	Ok(())
}

/// Anything that reads and writes whole pages: a local driver or a remote
/// programmer.
pub trait PageIo {
	fn page_count(&self) -> usize;

	fn read_page(&mut self, page: u8) -> crate::AResult<Page>;

	fn write_page(&mut self, page: u8, data: &Page) -> crate::AResult<()>;
}

impl<'a, P: ?Sized + PageIo> PageIo for &'a mut P {
	fn page_count(&self) -> usize {
		P::page_count(*self)
	}

	fn read_page(&mut self, page: u8) -> crate::AResult<Page> {
		P::read_page(*self, page)
	}

	fn write_page(&mut self, page: u8, data: &Page) -> crate::AResult<()> {
		P::write_page(*self, page, data)
	}
}

/// Page access to an initialized local driver
pub struct Paged<E: EepromIo> {
	eeprom: E,
	capacity: usize,
}

impl<E: EepromIo> Paged<E> {
	pub fn new(eeprom: E, capacity: usize) -> Self {
		Paged { eeprom, capacity }
	}

	pub fn into_inner(self) -> E {
		self.eeprom
	}
}

impl<E: EepromIo> PageIo for Paged<E> {
	fn page_count(&self) -> usize {
		page_count(self.capacity)
	}

	fn read_page(&mut self, page: u8) -> crate::AResult<Page> {
		read_page(&mut self.eeprom, self.capacity, page)
	}

	fn write_page(&mut self, page: u8, data: &Page) -> crate::AResult<()> {
		write_page(&mut self.eeprom, self.capacity, page, data)
	}
}

fn capacity<P: PageIo + ?Sized>(io: &P) -> usize {
	io.page_count() * PAGE_SIZE
}

pub fn read_image<P: PageIo + ?Sized>(io: &mut P) -> crate::AResult<Vec<u8>> {
	let mut image = Vec::with_capacity(capacity(io));
	for page in 0..io.page_count() {
		image.extend_from_slice(&io.read_page(page as u8)?);
	}
	Ok(image)
}

/// split `image` into pages, padding the last one
pub fn pages(image: &[u8]) -> impl Iterator<Item = Page> + '_ {
	image.chunks(PAGE_SIZE).map(|chunk| {
		let mut page = [PADDING; PAGE_SIZE];
		page[..chunk.len()].copy_from_slice(chunk);
		page
	})
}

/// write `image` starting at address 0 (without verifying it)
pub fn write_image<P: PageIo + ?Sized>(io: &mut P, image: &[u8]) -> crate::AResult<()> {
	ensure!(image.len() <= capacity(io),
		"image too large: {} bytes (capacity: {} bytes)", image.len(), capacity(io)
	);
	for (page, data) in pages(image).enumerate() {
		io.write_page(page as u8, &data)?;
	}
	Ok(())
}

pub fn verify_image<P: PageIo + ?Sized>(io: &mut P, image: &[u8]) -> crate::AResult<()> {
	ensure!(image.len() <= capacity(io), "image larger than EEPROM ({} bytes)", capacity(io));
	for (page, expected) in image.chunks(PAGE_SIZE).enumerate() {
		let data = io.read_page(page as u8)?;
		if let Some(offset) = (0..expected.len()).find(|&i| data[i] != expected[i]) {
			let address = page * PAGE_SIZE + offset;
			bail!("Verify failed at {:04x}: expected {:02x}, EEPROM has {:02x}", address, expected[offset], data[offset]);
		}
	}
	Ok(())
}
