//! The base's control loop: startup sequencing and the fixed-order cycle.
//!
//! Per cycle: read lines, decode both wheels, publish ticks, sample and
//! publish the IMU, then hand the bus its event pass. The loop has no period
//! of its own; it runs as fast as the bus and sensors allow and yields to the
//! executor once per cycle.

use embassy_futures::yield_now;

use crate::calibration::{load_calibration, ParamSource};
use crate::config::IMU_ERROR_LOG_EVERY;
use crate::drivers::encoder_lines::SensorLines;
use crate::drivers::imu::{self, ImuDevice};
use crate::encoder::{EncoderChannel, TickMessage};
use crate::ipc::{MessageBus, Outbound};
use crate::tasks::stats::CycleStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartupError<I, L> {
    /// IMU did not initialize or rejected its calibration.
    Imu(I),
    /// First encoder read failed.
    Lines(L),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleError<I, L, B> {
    Lines(L),
    Imu(I),
    Bus(B),
}

pub struct Controller<I, L, B> {
    imu: I,
    lines: L,
    bus: B,
    left: EncoderChannel,
    right: EncoderChannel,
    stats: &'static CycleStats,
    consecutive_imu_errors: u32,
}

impl<I, L, B> Controller<I, L, B>
where
    I: ImuDevice,
    L: SensorLines,
    B: MessageBus,
{
    /// Bring the base up: IMU init, calibration upload, first encoder read.
    ///
    /// Nothing is published before this returns `Ok`. On `Err` the caller
    /// must not start the loop.
    pub async fn start<P: ParamSource>(
        mut imu: I,
        mut lines: L,
        bus: B,
        params: &mut P,
        stats: &'static CycleStats,
    ) -> Result<Self, StartupError<I::Error, L::Error>> {
        imu.init().await.map_err(StartupError::Imu)?;
        log_info!("IMU initialized");

        load_calibration(&mut imu, params)
            .await
            .map_err(StartupError::Imu)?;

        let first = lines.read().map_err(StartupError::Lines)?;
        log_info!(
            "Encoders seeded: left state {}, right state {}",
            first.left.state(),
            first.right.state()
        );

        Ok(Self {
            imu,
            lines,
            bus,
            left: EncoderChannel::new(first.left),
            right: EncoderChannel::new(first.right),
            stats,
            consecutive_imu_errors: 0,
        })
    }

    pub fn ticks(&self) -> TickMessage {
        TickMessage::from_channels(&self.left, &self.right)
    }

    pub fn left(&self) -> &EncoderChannel {
        &self.left
    }

    pub fn right(&self) -> &EncoderChannel {
        &self.right
    }

    /// One iteration of the publish cycle.
    ///
    /// A line read failure aborts before anything is published. An IMU
    /// failure drops only the IMU messages of this cycle; the tick messages
    /// and the bus event pass still go out. A publish failure stops further
    /// publishing but the event pass still runs.
    pub async fn cycle(&mut self) -> Result<(), CycleError<I::Error, L::Error, B::Error>> {
        let lines = match self.lines.read() {
            Ok(lines) => lines,
            Err(e) => {
                self.stats.record_line_error();
                return Err(CycleError::Lines(e));
            }
        };

        self.left.update(lines.left);
        self.right.update(lines.right);
        self.stats
            .set_anomalies(self.left.anomalies().wrapping_add(self.right.anomalies()));

        let ticks = self.ticks();
        let mut staged = self
            .publish_all(&[
                Outbound::LeftTicks(ticks.left),
                Outbound::RightTicks(ticks.right),
            ])
            .await;

        let sampled = imu::sample(&mut self.imu).await;
        match &sampled {
            Ok(sample) => {
                self.consecutive_imu_errors = 0;
                if staged.is_ok() {
                    staged = self
                        .publish_all(&[
                            Outbound::imu(sample),
                            Outbound::magnetic_field(sample),
                            Outbound::Calibration(sample.calib),
                        ])
                        .await;
                }
            }
            Err(_) => {
                self.stats.record_imu_error();
                self.consecutive_imu_errors = self.consecutive_imu_errors.wrapping_add(1);
            }
        }

        // The event pass runs even after a failed publish so frames staged
        // this cycle never leak into the next one.
        let spun = self.bus.spin_once().await;
        staged?;
        if let Err(e) = spun {
            self.stats.record_bus_error();
            return Err(CycleError::Bus(e));
        }
        self.stats.record_cycle();

        sampled.map(|_| ()).map_err(CycleError::Imu)
    }

    /// Publish in order, stopping at the first failure.
    async fn publish_all(
        &mut self,
        msgs: &[Outbound],
    ) -> Result<(), CycleError<I::Error, L::Error, B::Error>> {
        for msg in msgs {
            self.publish(msg).await?;
        }
        Ok(())
    }

    async fn publish(&mut self, msg: &Outbound) -> Result<(), CycleError<I::Error, L::Error, B::Error>> {
        self.bus.publish(msg).await.map_err(|e| {
            self.stats.record_bus_error();
            CycleError::Bus(e)
        })
    }

    /// Run the cycle forever. Errors are counted and logged, never fatal.
    pub async fn run(mut self) {
        log_info!("Control loop started");
        loop {
            match self.cycle().await {
                Ok(()) => {}
                Err(CycleError::Imu(_)) => {
                    if self.consecutive_imu_errors % IMU_ERROR_LOG_EVERY == 1 {
                        log_warn!(
                            "IMU sample failed ({} consecutive)",
                            self.consecutive_imu_errors
                        );
                    }
                }
                Err(CycleError::Lines(_)) => log_warn!("Encoder line read failed"),
                Err(CycleError::Bus(_)) => log_warn!("Host link publish failed"),
            }
            yield_now().await;
        }
    }
}

/// Park forever after a failed bring-up. Nothing is ever published.
pub async fn halt() {
    log_error!("Startup failed, halting");
    loop {
        core::future::pending::<()>().await;
    }
}
