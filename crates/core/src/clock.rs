//! Time source used by every component that reasons about hold expiry or
//! event dates.

use chrono::{DateTime, Utc};

/// Abstracts "now" so sweeps and classifications can be tested without
/// sleeping real time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
