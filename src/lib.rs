#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

macro_rules! with_context {
	(( $fmt:tt $($t:tt)* ), $e:expr) => {{
		use failure::Error;

		match (|| { $e })() {
			Ok(v) => Ok(v),
			Err(e) => {
				let e: Error = e;
				let msg = format!(concat!($fmt, ": {}") $($t)*, e);
				Err(Error::from(e.context(msg)))
			}
		}
	}};

	($msg:expr, $e:expr) => {
		with_context!(("{}", $msg), $e)
	};
}

pub type AResult<T> = Result<T, failure::Error>;

pub mod eeprom;
pub mod gpio;
pub mod linux;
pub mod pages;
pub mod port;
pub mod protocol;
pub mod sim;
pub mod twi;
pub mod variant;

pub use self::eeprom::{
	At28c64,
	Eeprom,
	EepromError,
	EepromIo,
	Mc24lcxx,
	Phase,
	setup_all,
};

pub use self::variant::{
	EepromType,
	EepromVariant,
};
