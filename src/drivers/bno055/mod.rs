//! Bosch BNO055 absolute-orientation IMU.
//!
//! `registers` is plain data and conversions; the async I2C driver only
//! exists on the STM32 build.

pub mod registers;

#[cfg(feature = "stm32")]
mod driver;

#[cfg(feature = "stm32")]
pub use driver::{Bno055, Bno055Error};

pub use registers::BNO055_ADDRESS_A;
