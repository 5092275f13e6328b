//! Hardware backends on Linux: GPIO lines through the GPIO character
//! device, the 2-wire bus through an i2c-dev character device.

mod gpio_cdev;
mod i2c_dev;

pub use self::gpio_cdev::{
	CdevGpio,
	DEFAULT_GPIO_CHIP,
};
pub use self::i2c_dev::I2cDev;
