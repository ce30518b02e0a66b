#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

#[macro_use]
mod logging;

#[cfg(feature = "stm32")]
pub mod board;
pub mod calibration;
pub mod config;
pub mod drivers;
pub mod encoder;
pub mod ipc;
pub mod params;
pub mod tasks;

#[cfg(feature = "stm32")]
pub use board::Board;
pub use calibration::CalibrationProfile;
pub use drivers::imu::{ImuDevice, ImuSample};
pub use encoder::EncoderChannel;
pub use tasks::control::Controller;
