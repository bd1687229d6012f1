use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::inventory::SeatRef;

use super::AuditRecord;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Groups of audit entry types, for reading one side of the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    /// Service start and stop.
    System,
    /// Staff edits to events, tiers and the seat map.
    Inventory,
    /// Holds placed, released or expired.
    Holds,
    /// Committed and compensated checkouts.
    Sales,
    /// Tickets admitted at the door.
    Gate,
}

impl AuditCategory {
    pub fn event_types(&self) -> &'static [&'static str] {
        match self {
            AuditCategory::System => &["service_started", "service_stopped"],
            AuditCategory::Inventory => &[
                "event_created",
                "tier_added",
                "stock_adjusted",
                "availability_toggled",
                "sector_deleted",
                "row_deleted",
                "status_changed",
            ],
            AuditCategory::Holds => &["hold_placed", "hold_released", "holds_expired"],
            AuditCategory::Sales => &["order_committed", "commit_compensated"],
            AuditCategory::Gate => &["ticket_used"],
        }
    }
}

/// Filter for reading the audit trail.
///
/// All set criteria must match. `event_types` matches any of its entries.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event_id: Option<String>,
    pub event_types: Vec<String>,
    /// Staff member or seat holder who caused the entry.
    pub user_id: Option<String>,
    pub order_id: Option<String>,
    /// `sector/row/seat` path.
    pub seat: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    /// Everything that happened to one event.
    pub fn for_event(event_id: impl Into<String>) -> Self {
        Self::new().with_event_id(event_id)
    }

    /// Holds and sales touching one seat.
    pub fn for_seat(event_id: impl Into<String>, seat: &SeatRef) -> Self {
        Self {
            seat: Some(seat.to_string()),
            ..Self::for_event(event_id)
        }
    }

    /// Commit and door entries of one order.
    pub fn for_order(order_id: impl Into<String>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            ..Self::new()
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }

    pub fn with_category(mut self, category: AuditCategory) -> Self {
        self.event_types
            .extend(category.event_types().iter().map(|t| t.to_string()));
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_time_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Append-only storage for the audit trail.
pub trait AuditStore: Send + Sync {
    /// Append a record, returns the assigned ID
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError>;

    /// Matching records, newest first.
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;

    /// Count matching records, ignoring pagination.
    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError>;

    /// Every entry touching one seat, oldest first: who held it, when the
    /// hold lapsed, and the order that sold it.
    fn seat_history(&self, event_id: &str, seat: &SeatRef) -> Result<Vec<AuditRecord>, AuditError> {
        let filter = AuditFilter::for_seat(event_id, seat).with_limit(i64::MAX);
        let mut records = self.query(&filter)?;
        records.reverse();
        Ok(records)
    }
}
