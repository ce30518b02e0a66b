use portable_atomic::{AtomicU32, Ordering};

/// Counters the control loop publishes for the stats task.
///
/// Single writer (control loop), single reader (stats task).
pub struct CycleStats {
    cycles: AtomicU32,
    imu_errors: AtomicU32,
    line_errors: AtomicU32,
    bus_errors: AtomicU32,
    anomalies: AtomicU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsSnapshot {
    pub cycles: u32,
    pub imu_errors: u32,
    pub line_errors: u32,
    pub bus_errors: u32,
    pub anomalies: u32,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycles: AtomicU32::new(0),
            imu_errors: AtomicU32::new(0),
            line_errors: AtomicU32::new(0),
            bus_errors: AtomicU32::new(0),
            anomalies: AtomicU32::new(0),
        }
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_imu_error(&self) {
        self.imu_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_line_error(&self) {
        self.line_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bus_error(&self) {
        self.bus_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Total diagonal transitions across both wheels.
    pub fn set_anomalies(&self, total: u32) {
        self.anomalies.store(total, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            imu_errors: self.imu_errors.load(Ordering::Relaxed),
            line_errors: self.line_errors.load(Ordering::Relaxed),
            bus_errors: self.bus_errors.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

pub static STATS: CycleStats = CycleStats::new();

#[cfg(feature = "stm32")]
#[embassy_executor::task]
pub async fn stats_task(stats: &'static CycleStats) {
    use crate::config::STATS_PERIOD_MS;
    use defmt::info;
    use embassy_time::{Duration, Ticker};

    info!("Stats task started");
    let mut ticker = Ticker::every(Duration::from_millis(STATS_PERIOD_MS));
    let mut last = stats.snapshot();

    loop {
        ticker.next().await;
        let now = stats.snapshot();
        info!(
            "Loop: {} Hz, imu_err={} line_err={} bus_err={} anomalies={}",
            now.cycles.wrapping_sub(last.cycles),
            now.imu_errors.wrapping_sub(last.imu_errors),
            now.line_errors.wrapping_sub(last.line_errors),
            now.bus_errors.wrapping_sub(last.bus_errors),
            now.anomalies
        );
        last = now;
    }
}
