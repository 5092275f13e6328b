use std::fmt;
use std::str;

/// Driver family; `id` is the type byte of the command protocol
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum EepromType {
	At28c64,
	Mc24lcxx,
}

impl EepromType {
	pub const ALL: [EepromType; 2] = [
		EepromType::At28c64,
		EepromType::Mc24lcxx,
	];

	pub fn id(&self) -> u8 {
		match self {
			EepromType::At28c64 => 0,
			EepromType::Mc24lcxx => 1,
		}
	}

	pub fn from_id(id: u8) -> Option<Self> {
		match id {
			0 => Some(EepromType::At28c64),
			1 => Some(EepromType::Mc24lcxx),
			_ => None,
		}
	}

	/// largest capacity any chip of the family can have, in bytes
	pub fn address_space(&self) -> usize {
		match self {
			EepromType::At28c64 => 8192,
			// 24LC512
			EepromType::Mc24lcxx => 0x10000,
		}
	}
}

impl fmt::Display for EepromType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			EepromType::At28c64 => f.write_str("Atmel AT28C64"),
			EepromType::Mc24lcxx => f.write_str("Microchip 24LCxx series"),
		}
	}
}

/// A concrete chip
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum EepromVariant {
	At28c64,
	Mc24lc32,
}

impl EepromVariant {
	pub const ALL: [EepromVariant; 2] = [
		EepromVariant::At28c64,
		EepromVariant::Mc24lc32,
	];

	pub fn eeprom_type(&self) -> EepromType {
		match self {
			EepromVariant::At28c64 => EepromType::At28c64,
			EepromVariant::Mc24lc32 => EepromType::Mc24lcxx,
		}
	}

	/// in bytes
	pub fn capacity(&self) -> usize {
		match self {
			EepromVariant::At28c64 => 8192,
			EepromVariant::Mc24lc32 => 4096,
		}
	}

	/// short name used on the command line
	pub fn name(&self) -> &'static str {
		match self {
			EepromVariant::At28c64 => "at28c64",
			EepromVariant::Mc24lc32 => "24lc32",
		}
	}
}

impl fmt::Display for EepromVariant {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			EepromVariant::At28c64 => f.write_str("Atmel AT28C64"),
			EepromVariant::Mc24lc32 => f.write_str("Microchip 24LC32"),
		}
	}
}

impl str::FromStr for EepromVariant {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let lower = s.to_ascii_lowercase();
		let name = lower.trim_start_matches("mc");
		match EepromVariant::ALL.iter().find(|v| v.name() == name) {
			Some(&v) => Ok(v),
			None => bail!(
				"unknown EEPROM {:?} (known: {})",
				s,
				EepromVariant::ALL.iter().map(|v| v.name()).collect::<Vec<_>>().join(", "),
			),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn type_ids() {
		for &variant in &EepromVariant::ALL {
			let t = variant.eeprom_type();
			assert_eq!(EepromType::from_id(t.id()), Some(t));
		}
		assert_eq!(EepromType::from_id(2), None);
		for &t in &EepromType::ALL {
			assert_eq!(EepromType::from_id(t.id()), Some(t));
		}
	}

	#[test]
	fn parse_variant() {
		assert_eq!("at28c64".parse::<EepromVariant>().unwrap(), EepromVariant::At28c64);
		assert_eq!("AT28C64".parse::<EepromVariant>().unwrap(), EepromVariant::At28c64);
		assert_eq!("24lc32".parse::<EepromVariant>().unwrap(), EepromVariant::Mc24lc32);
		assert_eq!("mc24LC32".parse::<EepromVariant>().unwrap(), EepromVariant::Mc24lc32);
		assert!("24lc64".parse::<EepromVariant>().is_err());
		assert!("".parse::<EepromVariant>().is_err());
	}

	#[test]
	fn capacities_are_whole_pages() {
		for &variant in &EepromVariant::ALL {
			assert_eq!(variant.capacity() % 256, 0, "{}", variant);
			assert!(variant.capacity() <= variant.eeprom_type().address_space());
		}
	}
}
