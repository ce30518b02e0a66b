//! BNO055 register map and raw-value conversions.

use crate::calibration::CalibrationProfile;
use crate::drivers::imu::{Quaternion, Vector3};

// BNO055 I2C address with COM3 tied low
pub const BNO055_ADDRESS_A: u8 = 0x28;

pub const BNO055_CHIP_ID_ADDR: u8 = 0x00;
pub const BNO055_MAG_DATA_X_LSB_ADDR: u8 = 0x0E;
pub const BNO055_GYRO_DATA_X_LSB_ADDR: u8 = 0x14;
pub const BNO055_QUATERNION_DATA_W_LSB_ADDR: u8 = 0x20;
pub const BNO055_LINEAR_ACCEL_DATA_X_LSB_ADDR: u8 = 0x28;
pub const BNO055_CALIB_STAT_ADDR: u8 = 0x35;
pub const BNO055_SYS_STAT_ADDR: u8 = 0x39;
pub const BNO055_SYS_ERR_ADDR: u8 = 0x3A;
pub const BNO055_UNIT_SEL_ADDR: u8 = 0x3B;
pub const BNO055_OPR_MODE_ADDR: u8 = 0x3D;
pub const BNO055_SYS_TRIGGER_ADDR: u8 = 0x3F;
pub const BNO055_ACCEL_OFFSET_X_LSB_ADDR: u8 = 0x55;

pub const BNO055_ID: u8 = 0xA0;

pub const OPR_MODE_CONFIG: u8 = 0x00;
pub const OPR_MODE_NDOF: u8 = 0x0C;

// orientation Android, m/s², dps, °C
pub const UNIT_SEL_DEFAULT: u8 = 0x80;

// System status values
pub const SYS_STAT_IDLE: u8 = 0;
pub const SYS_STAT_SYS_ERROR: u8 = 1;
pub const SYS_STAT_INIT_PERIPHERALS: u8 = 2;
pub const SYS_STAT_SYS_INIT: u8 = 3;
pub const SYS_STAT_EXECUTING_SELFTEST: u8 = 4;
pub const SYS_STAT_SENSOR_FUSION_RUNNING: u8 = 5;
pub const SYS_STAT_RUNNING_NO_FUSION: u8 = 6;

// LSB per unit
pub const ACCEL_SCALE: f32 = 1.0 / 100.0;
pub const GYRO_SCALE: f32 = 1.0 / 16.0;
pub const MAG_SCALE: f32 = 1.0 / 16.0;
pub const QUAT_SCALE: f32 = 1.0 / (1 << 14) as f32;

/// Offset block length: accel xyz, mag xyz, gyro xyz, accel radius, mag radius.
pub const OFFSET_BLOCK_LEN: usize = 22;

#[inline]
fn le_i16(raw: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([raw[at], raw[at + 1]])
}

pub fn vector_from_raw(raw: &[u8; 6], scale: f32) -> Vector3 {
    Vector3 {
        x: le_i16(raw, 0) as f32 * scale,
        y: le_i16(raw, 2) as f32 * scale,
        z: le_i16(raw, 4) as f32 * scale,
    }
}

pub fn quaternion_from_raw(raw: &[u8; 8]) -> Quaternion {
    Quaternion {
        w: le_i16(raw, 0) as f32 * QUAT_SCALE,
        x: le_i16(raw, 2) as f32 * QUAT_SCALE,
        y: le_i16(raw, 4) as f32 * QUAT_SCALE,
        z: le_i16(raw, 6) as f32 * QUAT_SCALE,
    }
}

/// The device stores mag offsets before gyro offsets, unlike the profile.
pub fn profile_from_raw(raw: &[u8; OFFSET_BLOCK_LEN]) -> CalibrationProfile {
    CalibrationProfile {
        accel_offset_x: le_i16(raw, 0),
        accel_offset_y: le_i16(raw, 2),
        accel_offset_z: le_i16(raw, 4),
        mag_offset_x: le_i16(raw, 6),
        mag_offset_y: le_i16(raw, 8),
        mag_offset_z: le_i16(raw, 10),
        gyro_offset_x: le_i16(raw, 12),
        gyro_offset_y: le_i16(raw, 14),
        gyro_offset_z: le_i16(raw, 16),
        accel_radius: le_i16(raw, 18),
        mag_radius: le_i16(raw, 20),
    }
}

pub fn profile_to_raw(profile: &CalibrationProfile) -> [u8; OFFSET_BLOCK_LEN] {
    let words = [
        profile.accel_offset_x,
        profile.accel_offset_y,
        profile.accel_offset_z,
        profile.mag_offset_x,
        profile.mag_offset_y,
        profile.mag_offset_z,
        profile.gyro_offset_x,
        profile.gyro_offset_y,
        profile.gyro_offset_z,
        profile.accel_radius,
        profile.mag_radius,
    ];

    let mut raw = [0u8; OFFSET_BLOCK_LEN];
    for (chunk, word) in raw.chunks_exact_mut(2).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    raw
}
