// Centralize all configuration constants
pub const UART_BAUDRATE: u32 = 115_200;
pub const I2C_FREQUENCY_HZ: u32 = 100_000;

// Statistics
pub const STATS_PERIOD_MS: u64 = 1000;
/// Log every Nth consecutive IMU sample failure.
pub const IMU_ERROR_LOG_EVERY: u32 = 100;

// Persisted calibration block: last 2 KiB page of the STM32G071RB flash.
pub const PARAM_FLASH_OFFSET: u32 = 0x1_F800;
pub const PARAM_BLOCK_MAX: usize = 512;

/// Parameter names, in `CalibrationProfile` field order.
pub const CALIBRATION_PARAMS: [&str; 11] = [
    "accel_offset_x",
    "accel_offset_y",
    "accel_offset_z",
    "accel_radius",
    "gyro_offset_x",
    "gyro_offset_y",
    "gyro_offset_z",
    "mag_offset_x",
    "mag_offset_y",
    "mag_offset_z",
    "mag_radius",
];

// Host link topics
pub const TOPIC_LEFT_TICKS: u8 = 0x01;
pub const TOPIC_RIGHT_TICKS: u8 = 0x02;
pub const TOPIC_IMU: u8 = 0x03;
pub const TOPIC_MAG: u8 = 0x04;
pub const TOPIC_CALIB: u8 = 0x05;

// Frame sizes
pub const FRAME_HEADER: [u8; 2] = [0xAA, 0x55];
pub const FRAME_OVERHEAD: usize = 6; // header(2) + topic + len + crc(2)
pub const OUTBOUND_BUFFER_SIZE: usize = 256;
