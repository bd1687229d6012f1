//! Types for the pass scheduler.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::classifier::ClassifyReport;
use crate::inventory::StoreError;
use crate::sweeper::SweepReport;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The pass could not list events.
    #[error("pass failed: {0}")]
    Store(#[from] StoreError),

    /// The blocking task running the pass panicked or was cancelled.
    #[error("pass task failed: {0}")]
    Join(String),
}

/// A finished pass and when it finished.
#[derive(Debug, Clone, Serialize)]
pub struct PassRecord<R> {
    pub finished_at: DateTime<Utc>,
    pub report: R,
}

/// Current state of the scheduler.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub sweep_interval_secs: u64,
    pub classify_interval_secs: u64,
    /// Passes run since process start, manual triggers included.
    pub sweep_passes: u64,
    pub classify_passes: u64,
    pub last_sweep: Option<PassRecord<SweepReport>>,
    pub last_classify: Option<PassRecord<ClassifyReport>>,
}

/// Mutable pass history shared with the loops.
#[derive(Debug, Default)]
pub(crate) struct PassHistory {
    pub sweep_passes: u64,
    pub classify_passes: u64,
    pub last_sweep: Option<PassRecord<SweepReport>>,
    pub last_classify: Option<PassRecord<ClassifyReport>>,
}
