pub mod control;
pub mod stats;

pub use control::{halt, Controller, CycleError, StartupError};
pub use stats::{CycleStats, StatsSnapshot, STATS};

#[cfg(feature = "stm32")]
pub use stats::stats_task;

#[cfg(feature = "stm32")]
#[embassy_executor::task]
pub async fn control_task(ctrl: crate::board::BaseController) {
    ctrl.run().await
}
