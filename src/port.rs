//! Serial connection from the host to a programmer board
//!
//! The board shows up as a USB serial device; the port is used raw (8N1,
//! no flow control) so page data passes through unchanged.

use std::time::Duration;

use serialport::{
	DataBits,
	FlowControl,
	Parity,
	SerialPort,
	SerialPortInfo,
	SerialPortType,
	StopBits,
};

use crate::protocol::Client;
use crate::variant::EepromVariant;

pub const BAUD_RATE: u32 = 9600;

/// how long to wait for a programmer answer (a page write takes ~2.6s)
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// USB manufacturer string of the programmer board
pub const MANUFACTURER: &str = "Teensyduino";

pub fn is_programmer(info: &SerialPortInfo) -> bool {
	match &info.port_type {
		SerialPortType::UsbPort(usb) => usb.manufacturer.as_ref().map_or(false, |m| m == MANUFACTURER),
		_ => false,
	}
}

/// names of all connected serial ports that look like a programmer
pub fn find_programmers() -> crate::AResult<Vec<String>> {
	let ports = with_context!(("enumerate serial ports"), Ok(serialport::available_ports()?))?;
	Ok(ports.into_iter().filter(is_programmer).map(|p| p.port_name).collect())
}

pub fn open(name: &str) -> crate::AResult<Box<dyn SerialPort>> {
	let port = with_context!(("open programmer {}", name), {
		Ok(serialport::new(name, BAUD_RATE)
			.data_bits(DataBits::Eight)
			.parity(Parity::None)
			.stop_bits(StopBits::One)
			.flow_control(FlowControl::None)
			.timeout(TIMEOUT)
			.open()?)
	})?;
	info!("Opened programmer {} at {} baud", name, BAUD_RATE);
	Ok(port)
}

/// open `name` and select `variant` on the programmer behind it
pub fn connect(name: &str, variant: EepromVariant) -> crate::AResult<Client<Box<dyn SerialPort>>> {
	Client::open(open(name)?, variant)
}
