use defmt::*;
use embassy_stm32::{i2c, mode::Async};
use embassy_time::{Duration, Timer};

use super::registers::*;
use crate::calibration::CalibrationProfile;
use crate::drivers::imu::{CalibrationStatus, ImuDevice, Quaternion, Vector3};

#[derive(Debug, Format)]
pub enum Bno055Error {
    I2c(i2c::Error),
    WrongChipId(u8),
    ModeNotApplied(u8),
    SystemError(u8),
    NotReady,
}

impl From<i2c::Error> for Bno055Error {
    fn from(e: i2c::Error) -> Self {
        Self::I2c(e)
    }
}

pub struct Bno055 {
    i2c: i2c::I2c<'static, Async>,
    addr: u8,
}

impl Bno055 {
    pub fn new(i2c: i2c::I2c<'static, Async>, addr: u8) -> Self {
        Self { i2c, addr }
    }

    async fn wait_for_chip_ready(&mut self) -> Result<(), Bno055Error> {
        // Reset takes up to 650ms; poll the ID register for up to 2s
        for _ in 0..20 {
            if let Ok(id) = self.read_byte(BNO055_CHIP_ID_ADDR).await {
                if id == BNO055_ID {
                    info!("Chip is ready");
                    return Ok(());
                }
            }
            Timer::after(Duration::from_millis(100)).await;
        }
        error!("Timeout waiting for chip to be ready");
        Err(Bno055Error::NotReady)
    }

    async fn set_mode(&mut self, mode: u8) -> Result<(), Bno055Error> {
        self.write_byte(BNO055_OPR_MODE_ADDR, mode).await?;
        // 7ms from any mode to config, 19ms from config to fusion
        Timer::after(Duration::from_millis(30)).await;

        let applied = self.read_byte(BNO055_OPR_MODE_ADDR).await?;
        if applied != mode {
            error!(
                "Failed to set mode: got 0x{:02X}, expected 0x{:02X}",
                applied, mode
            );
            return Err(Bno055Error::ModeNotApplied(applied));
        }
        Ok(())
    }

    async fn check_system_status(&mut self) -> Result<(), Bno055Error> {
        let sys_stat = self.read_byte(BNO055_SYS_STAT_ADDR).await?;
        let sys_err = self.read_byte(BNO055_SYS_ERR_ADDR).await?;

        info!(
            "System status: 0x{:02X}, System error: 0x{:02X}",
            sys_stat, sys_err
        );

        match sys_stat {
            SYS_STAT_IDLE => info!("System idle"),
            SYS_STAT_SYS_ERROR => {
                error!("System error detected, error code: 0x{:02X}", sys_err);
                return Err(Bno055Error::SystemError(sys_err));
            }
            SYS_STAT_INIT_PERIPHERALS => info!("Initializing peripherals..."),
            SYS_STAT_SYS_INIT => info!("System initialization..."),
            SYS_STAT_EXECUTING_SELFTEST => info!("Executing self-test..."),
            SYS_STAT_SENSOR_FUSION_RUNNING => info!("Sensor fusion running"),
            SYS_STAT_RUNNING_NO_FUSION => info!("Running without fusion"),
            _ => warn!("Unknown system status: 0x{:02X}", sys_stat),
        }
        Ok(())
    }

    async fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), i2c::Error> {
        self.i2c.write(self.addr, &[reg, value]).await
    }

    async fn read_byte(&mut self, reg: u8) -> Result<u8, i2c::Error> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(self.addr, &[reg], &mut buf).await?;
        Ok(buf[0])
    }

    async fn read_bytes<const N: usize>(&mut self, reg: u8) -> Result<[u8; N], i2c::Error> {
        let mut buf = [0u8; N];
        self.i2c.write_read(self.addr, &[reg], &mut buf).await?;
        Ok(buf)
    }
}

impl ImuDevice for Bno055 {
    type Error = Bno055Error;

    async fn init(&mut self) -> Result<(), Bno055Error> {
        info!("Starting BNO055 initialization sequence...");

        // Give the chip time to power up
        Timer::after(Duration::from_millis(100)).await;

        let id = self.read_byte(BNO055_CHIP_ID_ADDR).await?;
        if id != BNO055_ID {
            error!(
                "Invalid BNO055 ID: 0x{:02X}, expected 0x{:02X}",
                id, BNO055_ID
            );
            return Err(Bno055Error::WrongChipId(id));
        }
        info!("BNO055 chip ID verified: 0x{:02X}", id);

        info!("Performing software reset...");
        self.write_byte(BNO055_SYS_TRIGGER_ADDR, 0x20).await?;
        Timer::after(Duration::from_millis(800)).await;
        self.wait_for_chip_ready().await?;

        self.set_mode(OPR_MODE_CONFIG).await?;

        info!("Configuring units...");
        self.write_byte(BNO055_UNIT_SEL_ADDR, UNIT_SEL_DEFAULT).await?;
        Timer::after(Duration::from_millis(10)).await;

        info!("Setting NDOF mode...");
        self.set_mode(OPR_MODE_NDOF).await?;

        self.check_system_status().await?;

        info!("BNO055 initialization completed successfully");
        Ok(())
    }

    async fn quaternion(&mut self) -> Result<Quaternion, Bno055Error> {
        let raw = self
            .read_bytes::<8>(BNO055_QUATERNION_DATA_W_LSB_ADDR)
            .await?;
        Ok(quaternion_from_raw(&raw))
    }

    async fn angular_velocity(&mut self) -> Result<Vector3, Bno055Error> {
        let raw = self.read_bytes::<6>(BNO055_GYRO_DATA_X_LSB_ADDR).await?;
        Ok(vector_from_raw(&raw, GYRO_SCALE))
    }

    async fn linear_acceleration(&mut self) -> Result<Vector3, Bno055Error> {
        let raw = self
            .read_bytes::<6>(BNO055_LINEAR_ACCEL_DATA_X_LSB_ADDR)
            .await?;
        Ok(vector_from_raw(&raw, ACCEL_SCALE))
    }

    async fn magnetic_field(&mut self) -> Result<Vector3, Bno055Error> {
        let raw = self.read_bytes::<6>(BNO055_MAG_DATA_X_LSB_ADDR).await?;
        Ok(vector_from_raw(&raw, MAG_SCALE))
    }

    async fn calibration_status(&mut self) -> Result<CalibrationStatus, Bno055Error> {
        let calib_byte = self.read_byte(BNO055_CALIB_STAT_ADDR).await?;
        Ok(CalibrationStatus::from_byte(calib_byte))
    }

    async fn offsets(&mut self) -> Result<CalibrationProfile, Bno055Error> {
        // Offset registers are only readable in config mode
        self.set_mode(OPR_MODE_CONFIG).await?;
        let raw = self
            .read_bytes::<OFFSET_BLOCK_LEN>(BNO055_ACCEL_OFFSET_X_LSB_ADDR)
            .await?;
        self.set_mode(OPR_MODE_NDOF).await?;
        Ok(profile_from_raw(&raw))
    }

    async fn set_offsets(&mut self, profile: &CalibrationProfile) -> Result<(), Bno055Error> {
        let mut buf = [0u8; OFFSET_BLOCK_LEN + 1];
        buf[0] = BNO055_ACCEL_OFFSET_X_LSB_ADDR;
        buf[1..].copy_from_slice(&profile_to_raw(profile));

        self.set_mode(OPR_MODE_CONFIG).await?;
        self.i2c.write(self.addr, &buf).await?;
        self.set_mode(OPR_MODE_NDOF).await?;
        info!("Calibration offsets written");
        Ok(())
    }
}
