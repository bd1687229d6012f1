//! Periodic expiry sweeps and status classification.
//!
//! Two independent loops share one shutdown signal:
//! - **Sweep**: releases expired holds every `sweep_interval_secs`
//! - **Classify**: recomputes event statuses every `classify_interval_secs`
//!
//! Both run one pass as soon as the scheduler starts.

mod config;
mod runner;
mod types;

pub use config::SchedulerConfig;
pub use runner::Scheduler;
pub use types::{PassRecord, SchedulerError, SchedulerStatus};
