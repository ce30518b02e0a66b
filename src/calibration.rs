//! IMU calibration profile and the startup merge with persisted parameters.
//!
//! The BNO055 forgets its offsets on power loss. At boot the device's current
//! profile is read, every persisted parameter that exists replaces its field,
//! and the result is written back once before sampling starts.

use crate::config::CALIBRATION_PARAMS;
use crate::drivers::imu::ImuDevice;

/// Number of signed 16-bit values in a profile.
pub const PROFILE_FIELDS: usize = 11;

/// Per-axis offsets and radii, in the device's native register units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationProfile {
    pub accel_offset_x: i16,
    pub accel_offset_y: i16,
    pub accel_offset_z: i16,
    pub accel_radius: i16,
    pub gyro_offset_x: i16,
    pub gyro_offset_y: i16,
    pub gyro_offset_z: i16,
    pub mag_offset_x: i16,
    pub mag_offset_y: i16,
    pub mag_offset_z: i16,
    pub mag_radius: i16,
}

impl CalibrationProfile {
    /// Fields in parameter order (see `config::CALIBRATION_PARAMS`).
    pub fn to_array(&self) -> [i16; PROFILE_FIELDS] {
        [
            self.accel_offset_x,
            self.accel_offset_y,
            self.accel_offset_z,
            self.accel_radius,
            self.gyro_offset_x,
            self.gyro_offset_y,
            self.gyro_offset_z,
            self.mag_offset_x,
            self.mag_offset_y,
            self.mag_offset_z,
            self.mag_radius,
        ]
    }

    pub fn from_array(v: [i16; PROFILE_FIELDS]) -> Self {
        Self {
            accel_offset_x: v[0],
            accel_offset_y: v[1],
            accel_offset_z: v[2],
            accel_radius: v[3],
            gyro_offset_x: v[4],
            gyro_offset_y: v[5],
            gyro_offset_z: v[6],
            mag_offset_x: v[7],
            mag_offset_y: v[8],
            mag_offset_z: v[9],
            mag_radius: v[10],
        }
    }

    /// Field-by-field override of `defaults` with whatever `params` holds.
    ///
    /// Absent parameters and failed reads both keep the default.
    pub fn merged<P: ParamSource>(defaults: &Self, params: &mut P) -> Self {
        let mut fields = defaults.to_array();
        let mut overridden = 0u8;

        for (field, name) in fields.iter_mut().zip(CALIBRATION_PARAMS.iter()) {
            match params.read_i16(name) {
                Ok(Some(value)) => {
                    *field = value;
                    overridden += 1;
                }
                Ok(None) => {}
                Err(_) => log_warn!("Calibration parameter {} unreadable, using device value", name),
            }
        }

        log_info!(
            "Calibration: {} of {} fields from stored parameters",
            overridden,
            PROFILE_FIELDS
        );
        Self::from_array(fields)
    }
}

/// Read-only key/value store holding persisted calibration parameters.
pub trait ParamSource {
    type Error;

    /// `Ok(None)` when the parameter was never stored.
    fn read_i16(&mut self, name: &str) -> Result<Option<i16>, Self::Error>;
}

/// Merge stored parameters over the device defaults and upload the result.
///
/// Runs once at startup. Any device error is returned to the caller, which
/// treats it as a failed IMU bring-up.
pub async fn load_calibration<I, P>(imu: &mut I, params: &mut P) -> Result<CalibrationProfile, I::Error>
where
    I: ImuDevice,
    P: ParamSource,
{
    let defaults = imu.offsets().await?;
    let profile = CalibrationProfile::merged(&defaults, params);
    imu.set_offsets(&profile).await?;
    Ok(profile)
}
