pub mod bno055;
pub mod encoder_lines;
pub mod imu;

#[cfg(feature = "stm32")]
pub use bno055::Bno055;
pub use encoder_lines::{EncoderLines, LinePair, PolledLines, SensorLines};
pub use imu::{CalibrationStatus, ImuDevice, ImuSample, Quaternion, Vector3};
