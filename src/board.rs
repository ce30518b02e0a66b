use embassy_stm32::flash::{Blocking, Flash};
use embassy_stm32::gpio::{Input, Pull};
use embassy_stm32::mode::Async;
use embassy_stm32::time::Hertz;
use embassy_stm32::usart::{self, Config as UsartConfig, UartTx};
use embassy_stm32::{bind_interrupts, i2c, peripherals, rcc, Config};

use crate::config::{I2C_FREQUENCY_HZ, PARAM_BLOCK_MAX, PARAM_FLASH_OFFSET, UART_BAUDRATE};
use crate::drivers::{Bno055, PolledLines};
use crate::ipc::FrameBus;
use crate::params::ParamTable;
use crate::tasks::Controller;

// ── IRQ table ─────────────────────────────────────────────
bind_interrupts!(pub struct Irqs {
    I2C2 => i2c::EventInterruptHandler<peripherals::I2C2>,
            i2c::ErrorInterruptHandler<peripherals::I2C2>;
});

pub type EncoderPins =
    PolledLines<Input<'static>, Input<'static>, Input<'static>, Input<'static>>;
pub type HostLink = FrameBus<UartTx<'static, Async>>;
pub type BaseController = Controller<Bno055, EncoderPins, HostLink>;

// ── Board struct ──────────────────────────────────────────
pub struct Board {
    pub i2c: i2c::I2c<'static, Async>, // DMA
    pub encoders: EncoderPins,
    pub host_tx: UartTx<'static, Async>, // DMA
    pub flash: Flash<'static, Blocking>,
}

impl Board {
    pub fn init() -> Result<Self, usart::ConfigError> {
        let mut config = Config::default();

        // HSI16 -> PLL -> 64MHz SYSCLK
        config.rcc.hsi = Some(rcc::Hsi {
            sys_div: rcc::HsiSysDiv::DIV1,
        });
        config.rcc.pll = Some(rcc::Pll {
            source: rcc::PllSource::HSI,    // Use HSI as PLL source
            prediv: rcc::PllPreDiv::DIV2,   // 16MHz / 2 = 8MHz
            mul: rcc::PllMul::MUL16,        // 8MHz * 16 = 128MHz
            divp: None,                     // Not used
            divq: None,                     // Not used
            divr: Some(rcc::PllRDiv::DIV2), // 128MHz / 2 = 64MHz
        });
        config.rcc.sys = rcc::Sysclk::PLL1_R;
        let p = embassy_stm32::init(config);

        // Quadrature lines idle high through the pull-ups
        let encoders = PolledLines::new(
            Input::new(p.PA0, Pull::Up),
            Input::new(p.PA1, Pull::Up),
            Input::new(p.PB0, Pull::Up),
            Input::new(p.PB1, Pull::Up),
        );

        // Host link, transmit only (DMA CH2)
        let mut us_cfg = UsartConfig::default();
        us_cfg.baudrate = UART_BAUDRATE;
        let host_tx = UartTx::new(p.USART1, p.PC4, p.DMA1_CH2, us_cfg)?;

        // I²C2  (DMA CH7 TX, CH6 RX); the IMU breakout carries its own pull-ups
        let mut i2c_cfg = i2c::Config::default();
        i2c_cfg.sda_pullup = false;
        i2c_cfg.scl_pullup = false;

        let i2c = i2c::I2c::new(
            p.I2C2,
            p.PB10,
            p.PB11,
            Irqs,
            p.DMA1_CH7,
            p.DMA1_CH6,
            Hertz(I2C_FREQUENCY_HZ),
            i2c_cfg,
        );

        let flash = Flash::new_blocking(p.FLASH);

        Ok(Self {
            i2c,
            encoders,
            host_tx,
            flash,
        })
    }

    /// Read the stored calibration block. Any failure yields an empty table.
    pub fn load_params(&mut self) -> ParamTable {
        let mut block = [0u8; PARAM_BLOCK_MAX];
        match self.flash.blocking_read(PARAM_FLASH_OFFSET, &mut block) {
            Ok(()) => ParamTable::load_or_empty(&block),
            Err(e) => {
                defmt::warn!("Parameter flash read failed: {:?}", e);
                ParamTable::new()
            }
        }
    }
}
