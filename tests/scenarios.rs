extern crate eeprom_programmer;

use eeprom_programmer::eeprom::{
	EMPTY_READ,
	ParallelPins,
	SerialPins,
};
use eeprom_programmer::sim::{
	SimGpio,
	SimTwoWire,
};
use eeprom_programmer::*;

const ADDRESSES: [u16; 12] = [
	0x0000, 0x0001, 0x00ff, 0x0100, 0x0abc, 0x0fff, 0x1234, 0x1fff,
	0x8000, 0x8001, 0xabcd, 0xffff,
];
const VALUES: [u8; 6] = [0x00, 0x01, 0x55, 0xaa, 0xfe, 0xff];

fn board() -> (SimGpio, SimTwoWire) {
	let gpio = SimGpio::new();
	gpio.attach_at28c64(ParallelPins::DEFAULT);
	let bus = SimTwoWire::with_24lc32(gpio.clone(), SerialPins::DEFAULT);
	(gpio, bus)
}

fn eeprom(eeprom_type: EepromType) -> (SimGpio, Eeprom<SimGpio, SimTwoWire>) {
	let (gpio, bus) = board();
	(gpio.clone(), Eeprom::new(eeprom_type, gpio, bus))
}

#[test]
fn write_then_read_back() {
	for &eeprom_type in &EepromType::ALL {
		let (gpio, mut ee) = eeprom(eeprom_type);
		ee.setup().unwrap();
		ee.init().unwrap();
		ee.write_byte(0x1234, 0xab).unwrap();
		assert_eq!(ee.read_byte(0x1234).unwrap(), 0xab, "{}", eeprom_type);
		ee.disable().unwrap();
		assert!(gpio.hazards().is_empty(), "{}: {:?}", eeprom_type, gpio.hazards());
	}
}

#[test]
fn spot_check_addresses_and_values() {
	for &eeprom_type in &EepromType::ALL {
		let (gpio, mut ee) = eeprom(eeprom_type);
		ee.setup().unwrap();
		ee.init().unwrap();
		for (i, &address) in ADDRESSES.iter().enumerate() {
			for &value in &VALUES {
				ee.write_byte(address, value).unwrap();
				assert_eq!(ee.read_byte(address).unwrap(), value, "{} @{:04x}", eeprom_type, address);
			}
			// leave a distinct value behind
			ee.write_byte(address, i as u8).unwrap();
		}
		ee.disable().unwrap();
		assert!(gpio.hazards().is_empty(), "{}: {:?}", eeprom_type, gpio.hazards());
	}
}

#[test]
fn contents_survive_power_cycle() {
	for &eeprom_type in &EepromType::ALL {
		let (_gpio, mut ee) = eeprom(eeprom_type);
		ee.setup().unwrap();
		ee.init().unwrap();
		ee.write_byte(0x0042, 0x24).unwrap();
		ee.disable().unwrap();

		ee.init().unwrap();
		assert_eq!(ee.read_byte(0x0042).unwrap(), 0x24, "{}", eeprom_type);
		// erased cell
		assert_eq!(ee.read_byte(0x0043).unwrap(), 0xff, "{}", eeprom_type);
		ee.disable().unwrap();
	}
}

#[test]
fn setup_equals_disable_on_fresh_board() {
	for &eeprom_type in &EepromType::ALL {
		let (setup_gpio, mut ee) = eeprom(eeprom_type);
		ee.setup().unwrap();

		let (disable_gpio, mut ee) = eeprom(eeprom_type);
		ee.disable().unwrap();

		assert_eq!(setup_gpio.lines(), disable_gpio.lines(), "{}", eeprom_type);
		assert_eq!(ee.phase(), Phase::Disabled);
	}
}

#[test]
fn disable_is_idempotent() {
	for &eeprom_type in &EepromType::ALL {
		let (gpio, mut ee) = eeprom(eeprom_type);
		ee.setup().unwrap();
		ee.init().unwrap();
		ee.disable().unwrap();
		let lines = gpio.lines();
		ee.disable().unwrap();
		assert_eq!(gpio.lines(), lines, "{}", eeprom_type);
	}
}

#[test]
fn disabled_chips_are_unpowered() {
	let (gpio, mut bus) = board();
	let mut gpio_handle = gpio.clone();
	setup_all(&mut gpio_handle, &mut bus).unwrap();
	assert!(!gpio.is_at28c64_powered());
	assert_eq!(gpio.line(SerialPins::DEFAULT.power).driven_level(), None);

	for &eeprom_type in &EepromType::ALL {
		let mut ee = Eeprom::new(eeprom_type, &mut gpio_handle, &mut bus);
		ee.init().unwrap();
		ee.disable().unwrap();
	}
	assert!(!gpio.is_at28c64_powered());
	assert_eq!(gpio.line(SerialPins::DEFAULT.power).driven_level(), None);
	assert!(gpio.hazards().is_empty(), "{:?}", gpio.hazards());
}

#[test]
fn missing_serial_chip_reads_empty() {
	let gpio = SimGpio::new();
	let mut ee = Eeprom::new(EepromType::Mc24lcxx, gpio.clone(), SimTwoWire::absent(gpio));
	ee.setup().unwrap();
	ee.init().unwrap();

	let e = ee.try_read_byte(0x0000).unwrap_err();
	assert_eq!(EepromError::of(&e), Some(EepromError::DeviceNotResponding));
	assert_eq!(ee.read_byte(0x0000).unwrap(), EMPTY_READ);

	let e = ee.write_byte(0x0000, 0x12).unwrap_err();
	assert_eq!(EepromError::of(&e), Some(EepromError::DeviceNotResponding));
	ee.disable().unwrap();
}
