use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::inventory::{EventStatus, SeatRef, StoreError};

/// Hold TTL limits.
#[derive(Debug, Clone, Copy)]
pub struct LedgerConfig {
    /// TTL used when the caller does not ask for one.
    pub default_hold_ttl_secs: u64,
    /// Longer requests are capped to this.
    pub max_hold_ttl_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_hold_ttl_secs: 600,
            max_hold_ttl_secs: 3600,
        }
    }
}

impl LedgerConfig {
    /// Effective TTL in seconds for a requested one.
    pub fn effective_ttl(&self, requested: Option<u64>) -> Result<u64, LedgerError> {
        match requested {
            Some(0) => Err(LedgerError::Invalid("hold TTL must be positive".to_string())),
            Some(secs) => Ok(secs.min(self.max_hold_ttl_secs)),
            None => Ok(self.default_hold_ttl_secs.min(self.max_hold_ttl_secs)),
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("sector not found: {0}")]
    SectorNotFound(String),

    #[error("row not found: {0}")]
    RowNotFound(String),

    #[error("seat not found: {0}")]
    SeatNotFound(SeatRef),

    #[error("seat {0} is held by someone else")]
    AlreadyReserved(SeatRef),

    #[error("seat {0} is already sold")]
    AlreadyOccupied(SeatRef),

    #[error("seat {0} is not available")]
    Unavailable(SeatRef),

    #[error("seat {0} is not reserved")]
    NotReserved(SeatRef),

    #[error("seat {0} is not held by the caller")]
    NotHeldByCaller(SeatRef),

    #[error("seat {0} is sold and cannot be disabled")]
    OccupiedSeatToggle(SeatRef),

    #[error("event is {0} and no longer takes holds")]
    EventClosed(EventStatus),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => LedgerError::EventNotFound(id),
            other => LedgerError::Store(other),
        }
    }
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::EventNotFound(_)
            | LedgerError::SectorNotFound(_)
            | LedgerError::RowNotFound(_)
            | LedgerError::SeatNotFound(_) => ErrorKind::NotFound,
            LedgerError::AlreadyReserved(_)
            | LedgerError::AlreadyOccupied(_)
            | LedgerError::Unavailable(_)
            | LedgerError::NotReserved(_)
            | LedgerError::OccupiedSeatToggle(_)
            | LedgerError::EventClosed(_) => ErrorKind::Conflict,
            LedgerError::NotHeldByCaller(_) => ErrorKind::Unauthorized,
            LedgerError::Invalid(_) => ErrorKind::Invalid,
            LedgerError::Store(e) => e.kind(),
        }
    }

    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            LedgerError::EventNotFound(_)
            | LedgerError::SectorNotFound(_)
            | LedgerError::RowNotFound(_)
            | LedgerError::SeatNotFound(_) => "not_found",
            LedgerError::AlreadyReserved(_) => "already_reserved",
            LedgerError::AlreadyOccupied(_) => "already_occupied",
            LedgerError::Unavailable(_) => "unavailable",
            LedgerError::NotReserved(_) => "not_reserved",
            LedgerError::NotHeldByCaller(_) => "not_held_by_caller",
            LedgerError::OccupiedSeatToggle(_) => "occupied_seat_toggle",
            LedgerError::EventClosed(_) => "event_closed",
            LedgerError::Invalid(_) => "invalid",
            LedgerError::Store(_) => "storage",
        }
    }
}

/// Result of a successful hold.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HoldReceipt {
    pub event_id: String,
    pub seat: SeatRef,
    pub holder_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Target of an availability toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ToggleScope {
    Sector {
        sector_id: String,
    },
    Row {
        sector_id: String,
        row_id: String,
    },
    Seat {
        #[serde(flatten)]
        seat: SeatRef,
    },
}

impl ToggleScope {
    pub fn name(&self) -> &'static str {
        match self {
            ToggleScope::Sector { .. } => "sector",
            ToggleScope::Row { .. } => "row",
            ToggleScope::Seat { .. } => "seat",
        }
    }

    pub fn target(&self) -> String {
        match self {
            ToggleScope::Sector { sector_id } => sector_id.clone(),
            ToggleScope::Row { sector_id, row_id } => format!("{}/{}", sector_id, row_id),
            ToggleScope::Seat { seat } => seat.to_string(),
        }
    }
}

/// Result of an availability toggle.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub scope: ToggleScope,
    /// New value of the target's flag.
    pub available: bool,
    /// Rows and seats below the target that were overwritten with it.
    pub cascaded: usize,
}
