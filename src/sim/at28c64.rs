use crate::eeprom::ParallelPins;
use crate::gpio::{
	Level,
	Pin,
};

use super::board::{
	Hazard,
	LineState,
	Lines,
	line_state,
};

const CAPACITY: usize = 8192;

/// AT28C64 behind two cascaded shift registers.
///
/// Undriven control lines read as inactive (pull-ups on WE, OE and the
/// power switch); the chip latches the address on the falling and the
/// data on the rising edge of WE.
pub(super) struct At28c64Chip {
	pins: ParallelPins,
	memory: Vec<u8>,
	shift: u16,
	write_address: Option<usize>,
}

fn is_driven_low(lines: &Lines, pin: Pin) -> bool {
	line_state(lines, pin).driven_level() == Some(Level::Low)
}

fn is_driven_high(lines: &Lines, pin: Pin) -> bool {
	line_state(lines, pin).driven_level() == Some(Level::High)
}

fn wire_level(state: LineState) -> Level {
	state.driven_level().unwrap_or(Level::Low)
}

impl At28c64Chip {
	pub(super) fn new(pins: ParallelPins) -> Self {
		At28c64Chip {
			pins,
			// erased
			memory: vec![0xff; CAPACITY],
			shift: 0,
			write_address: None,
		}
	}

	pub(super) fn peek(&self, address: u16) -> u8 {
		self.memory[address as usize % CAPACITY]
	}

	pub(super) fn poke(&mut self, address: u16, value: u8) {
		self.memory[address as usize % CAPACITY] = value;
	}

	pub(super) fn is_powered(&self, lines: &Lines) -> bool {
		is_driven_low(lines, self.pins.power_enable)
	}

	pub(super) fn latched_address(&self, lines: &Lines) -> Option<u16> {
		if is_driven_high(lines, self.pins.shift_enable) {
			Some(self.shift)
		} else {
			None
		}
	}

	// address pins float without enabled shift register outputs
	fn address(&self, lines: &Lines) -> usize {
		self.latched_address(lines).unwrap_or(0xffff) as usize % CAPACITY
	}

	fn drives_bus(&self, lines: &Lines) -> bool {
		self.is_powered(lines)
			&& is_driven_low(lines, self.pins.output_enable)
			&& !is_driven_low(lines, self.pins.write_enable)
	}

	/// level the chip puts on `pin`, if any
	pub(super) fn output(&self, lines: &Lines, pin: Pin) -> Option<Level> {
		if !self.drives_bus(lines) {
			return None;
		}
		let bit = self.pins.data.iter().position(|&p| p == pin)?;
		let value = self.memory[self.address(lines)];
		Some(Level::from(0 != value & (1 << bit)))
	}

	fn data_bus(&self, lines: &Lines) -> u8 {
		let mut value = 0u8;
		for (bit, &pin) in self.pins.data.iter().enumerate() {
			if is_driven_high(lines, pin) {
				value |= 1 << bit;
			}
		}
		value
	}

	pub(super) fn line_changed(&mut self, lines: &Lines, pin: Pin, before: LineState, hazards: &mut Vec<Hazard>) {
		let after = line_state(lines, pin);

		if pin == self.pins.shift_clock
			&& wire_level(before).is_low()
			&& wire_level(after).is_high()
		{
			let bit = is_driven_high(lines, self.pins.shift_data) as u16;
			self.shift = (self.shift << 1) | bit;
		}

		if pin == self.pins.write_enable {
			let was_low = before.driven_level() == Some(Level::Low);
			let is_low = after.driven_level() == Some(Level::Low);
			if !was_low && is_low {
				if self.is_powered(lines) {
					self.write_address = Some(self.address(lines));
				} else {
					hazards.push(Hazard::WriteUnpowered);
				}
			} else if was_low && !is_low {
				if let Some(address) = self.write_address.take() {
					if self.is_powered(lines) && !is_driven_low(lines, self.pins.output_enable) {
						self.memory[address] = self.data_bus(lines);
					}
				}
			}
		}

		if self.drives_bus(lines) {
			for &data_pin in &self.pins.data {
				if line_state(lines, data_pin).driven_level().is_some() {
					hazards.push(Hazard::BusContention(data_pin));
				}
			}
		}
	}
}
