//! Scheduler configuration.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

/// Configuration for the background sweep and classification passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// When disabled, passes only run through the manual trigger endpoints.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between expiry sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Seconds between status classification passes.
    #[serde(default = "default_classify_interval")]
    pub classify_interval_secs: u64,

    /// Offset from UTC where the calendar day starts for the classifier.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_classify_interval() -> u64 {
    86_400 // daily
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sweep_interval_secs: default_sweep_interval(),
            classify_interval_secs: default_classify_interval(),
            utc_offset_minutes: 0,
        }
    }
}

impl SchedulerConfig {
    /// `None` when the offset is outside what `chrono` accepts.
    pub fn offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }
}
