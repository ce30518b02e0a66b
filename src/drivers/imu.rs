//! IMU data types and the device seam the control loop samples through.

use crate::calibration::CalibrationProfile;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationStatus {
    pub sys: u8,   // System calibration (0-3)
    pub gyro: u8,  // Gyroscope calibration (0-3)
    pub accel: u8, // Accelerometer calibration (0-3)
    pub mag: u8,   // Magnetometer calibration (0-3)
}

impl CalibrationStatus {
    pub fn from_byte(calib_byte: u8) -> Self {
        Self {
            sys: (calib_byte >> 6) & 0x03,
            gyro: (calib_byte >> 4) & 0x03,
            accel: (calib_byte >> 2) & 0x03,
            mag: calib_byte & 0x03,
        }
    }
}

/// One pass-through reading of the IMU, rebuilt every control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImuSample {
    pub quat: Quaternion,
    pub gyro: Vector3,
    pub linear_accel: Vector3,
    pub mag: Vector3,
    pub calib: CalibrationStatus,
}

impl ImuSample {
    /// Orientation/motion array in published order:
    /// quaternion w/x/y/z, angular velocity x/y/z, linear acceleration x/y/z.
    pub fn motion_array(&self) -> [f32; 10] {
        [
            self.quat.w,
            self.quat.x,
            self.quat.y,
            self.quat.z,
            self.gyro.x,
            self.gyro.y,
            self.gyro.z,
            self.linear_accel.x,
            self.linear_accel.y,
            self.linear_accel.z,
        ]
    }
}

/// Everything the control loop needs from an absolute-orientation IMU.
///
/// Implementations perform bus I/O; none of these calls retry.
pub trait ImuDevice {
    type Error;

    /// Bring the device up. A failure here is terminal for the firmware.
    async fn init(&mut self) -> Result<(), Self::Error>;

    async fn quaternion(&mut self) -> Result<Quaternion, Self::Error>;
    async fn angular_velocity(&mut self) -> Result<Vector3, Self::Error>;
    async fn linear_acceleration(&mut self) -> Result<Vector3, Self::Error>;
    async fn magnetic_field(&mut self) -> Result<Vector3, Self::Error>;
    async fn calibration_status(&mut self) -> Result<CalibrationStatus, Self::Error>;

    /// Offset profile the device currently holds (factory or last written).
    async fn offsets(&mut self) -> Result<CalibrationProfile, Self::Error>;
    async fn set_offsets(&mut self, profile: &CalibrationProfile) -> Result<(), Self::Error>;
}

impl<T: ImuDevice + ?Sized> ImuDevice for &mut T {
    type Error = T::Error;

    async fn init(&mut self) -> Result<(), T::Error> {
        (**self).init().await
    }

    async fn quaternion(&mut self) -> Result<Quaternion, T::Error> {
        (**self).quaternion().await
    }

    async fn angular_velocity(&mut self) -> Result<Vector3, T::Error> {
        (**self).angular_velocity().await
    }

    async fn linear_acceleration(&mut self) -> Result<Vector3, T::Error> {
        (**self).linear_acceleration().await
    }

    async fn magnetic_field(&mut self) -> Result<Vector3, T::Error> {
        (**self).magnetic_field().await
    }

    async fn calibration_status(&mut self) -> Result<CalibrationStatus, T::Error> {
        (**self).calibration_status().await
    }

    async fn offsets(&mut self) -> Result<CalibrationProfile, T::Error> {
        (**self).offsets().await
    }

    async fn set_offsets(&mut self, profile: &CalibrationProfile) -> Result<(), T::Error> {
        (**self).set_offsets(profile).await
    }
}

/// Issue the five per-cycle queries in order and assemble a sample.
///
/// The first failing query aborts the sample; no partial data escapes.
pub async fn sample<I: ImuDevice>(imu: &mut I) -> Result<ImuSample, I::Error> {
    let quat = imu.quaternion().await?;
    let gyro = imu.angular_velocity().await?;
    let linear_accel = imu.linear_acceleration().await?;
    let mag = imu.magnetic_field().await?;
    let calib = imu.calibration_status().await?;

    Ok(ImuSample {
        quat,
        gyro,
        linear_accel,
        mag,
        calib,
    })
}


#[cfg(test)]
mod tests {
    use super::mock::{MockImu, MockImuError, Query};
    use super::*;
    use embassy_futures::block_on;

    fn reading() -> ImuSample {
        ImuSample {
            quat: Quaternion {
                w: 1.0,
                x: 0.0,
                y: 0.0,
                z: 0.0,
            },
            gyro: Vector3 {
                x: 0.1,
                y: 0.2,
                z: 0.3,
            },
            linear_accel: Vector3 {
                x: -1.0,
                y: 0.5,
                z: 9.0,
            },
            mag: Vector3 {
                x: 20.0,
                y: -5.0,
                z: 40.0,
            },
            calib: CalibrationStatus {
                sys: 3,
                gyro: 3,
                accel: 1,
                mag: 0,
            },
        }
    }

    #[test]
    fn test_calibration_status_unpacks_two_bit_fields() {
        let status = CalibrationStatus::from_byte(0b11_10_01_00);
        assert_eq!(status.sys, 3);
        assert_eq!(status.gyro, 2);
        assert_eq!(status.accel, 1);
        assert_eq!(status.mag, 0);
    }

    #[test]
    fn test_sample_issues_five_queries_in_order() {
        let mut imu = MockImu::new(reading());
        let sample = block_on(sample(&mut imu)).unwrap();

        assert_eq!(sample, reading());
        assert_eq!(
            imu.queries,
            vec![
                Query::Quaternion,
                Query::AngularVelocity,
                Query::LinearAcceleration,
                Query::MagneticField,
                Query::CalibrationStatus,
            ]
        );
    }

    #[test]
    fn test_sample_failure_yields_no_partial_data() {
        let mut imu = MockImu::new(reading());
        imu.fail_on = Some(Query::MagneticField);

        assert_eq!(block_on(sample(&mut imu)), Err(MockImuError::Bus));
        assert!(!imu.queries.contains(&Query::CalibrationStatus));
    }

    #[test]
    fn test_motion_array_layout() {
        let array = reading().motion_array();
        assert_eq!(
            array,
            [1.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.3, -1.0, 0.5, 9.0]
        );
    }
}
