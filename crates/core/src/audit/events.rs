use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Inventory administration
    EventCreated {
        event_id: String,
        created_by: String,
        name: String,
        date: NaiveDate,
        seated: bool,
    },
    TierAdded {
        event_id: String,
        tier_id: String,
        price_cents: u64,
        capacity: u32,
        added_by: String,
    },
    StockAdjusted {
        event_id: String,
        tier_id: String,
        previous_capacity: u32,
        capacity: u32,
        remaining: u32,
        changed_by: String,
    },
    AvailabilityToggled {
        event_id: String,
        scope: String,
        target: String,
        available: bool,
        changed_by: String,
    },
    SectorDeleted {
        event_id: String,
        sector_id: String,
        deleted_by: String,
    },
    RowDeleted {
        event_id: String,
        sector_id: String,
        row_id: String,
        deleted_by: String,
    },
    /// `changed_by` is `None` when the daily classification made the change.
    StatusChanged {
        event_id: String,
        from_status: String,
        to_status: String,
        changed_by: Option<String>,
    },

    // Holds
    HoldPlaced {
        event_id: String,
        seat: String,
        holder_id: String,
        expires_at: DateTime<Utc>,
    },
    HoldReleased {
        event_id: String,
        seat: String,
        holder_id: String,
    },
    HoldsExpired {
        event_id: String,
        seats: Vec<String>,
    },

    // Checkout and gate
    OrderCommitted {
        event_id: String,
        order_id: String,
        holder_id: String,
        tickets: u32,
        total_cents: u64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        seats: Vec<String>,
    },
    /// The event write succeeded but the order write did not; stock was put back.
    CommitCompensated {
        event_id: String,
        holder_id: String,
        reason: String,
    },
    TicketUsed {
        event_id: String,
        order_id: String,
        verifier_code: String,
        validated_by: String,
    },
}

impl AuditEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::EventCreated { .. } => "event_created",
            Self::TierAdded { .. } => "tier_added",
            Self::StockAdjusted { .. } => "stock_adjusted",
            Self::AvailabilityToggled { .. } => "availability_toggled",
            Self::SectorDeleted { .. } => "sector_deleted",
            Self::RowDeleted { .. } => "row_deleted",
            Self::StatusChanged { .. } => "status_changed",
            Self::HoldPlaced { .. } => "hold_placed",
            Self::HoldReleased { .. } => "hold_released",
            Self::HoldsExpired { .. } => "holds_expired",
            Self::OrderCommitted { .. } => "order_committed",
            Self::CommitCompensated { .. } => "commit_compensated",
            Self::TicketUsed { .. } => "ticket_used",
        }
    }

    /// The event (show) this audit entry concerns, if any.
    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
            Self::EventCreated { event_id, .. }
            | Self::TierAdded { event_id, .. }
            | Self::StockAdjusted { event_id, .. }
            | Self::AvailabilityToggled { event_id, .. }
            | Self::SectorDeleted { event_id, .. }
            | Self::RowDeleted { event_id, .. }
            | Self::StatusChanged { event_id, .. }
            | Self::HoldPlaced { event_id, .. }
            | Self::HoldReleased { event_id, .. }
            | Self::HoldsExpired { event_id, .. }
            | Self::OrderCommitted { event_id, .. }
            | Self::CommitCompensated { event_id, .. }
            | Self::TicketUsed { event_id, .. } => Some(event_id),
        }
    }

    /// Who caused the change: a staff identity or a seat holder.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::EventCreated { created_by, .. } => Some(created_by),
            Self::TierAdded { added_by, .. } => Some(added_by),
            Self::StockAdjusted { changed_by, .. }
            | Self::AvailabilityToggled { changed_by, .. } => Some(changed_by),
            Self::SectorDeleted { deleted_by, .. } | Self::RowDeleted { deleted_by, .. } => {
                Some(deleted_by)
            }
            Self::StatusChanged { changed_by, .. } => changed_by.as_deref(),
            Self::HoldPlaced { holder_id, .. }
            | Self::HoldReleased { holder_id, .. }
            | Self::OrderCommitted { holder_id, .. }
            | Self::CommitCompensated { holder_id, .. } => Some(holder_id),
            Self::TicketUsed { validated_by, .. } => Some(validated_by),
            Self::ServiceStarted { .. }
            | Self::ServiceStopped { .. }
            | Self::HoldsExpired { .. } => None,
        }
    }

    /// The order this entry concerns, if any.
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::OrderCommitted { order_id, .. } | Self::TicketUsed { order_id, .. } => {
                Some(order_id)
            }
            _ => None,
        }
    }

    /// Seats (`sector/row/seat`) the entry touched.
    pub fn seats(&self) -> Vec<&str> {
        match self {
            Self::HoldPlaced { seat, .. } | Self::HoldReleased { seat, .. } => vec![seat.as_str()],
            Self::HoldsExpired { seats, .. } | Self::OrderCommitted { seats, .. } => {
                seats.iter().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// A stored audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub event_id: Option<String>,
    pub user_id: Option<String>,
    pub data: AuditEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_service_started() {
        let event = AuditEvent::ServiceStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc123".to_string(),
        };
        assert_eq!(event.event_type(), "service_started");
        assert_eq!(event.event_id(), None);
        assert_eq!(event.user_id(), None);
    }

    #[test]
    fn test_hold_placed_ids() {
        let event = AuditEvent::HoldPlaced {
            event_id: "evt-1".to_string(),
            seat: "sec-a/row-1/s1-1".to_string(),
            holder_id: "buyer-x".to_string(),
            expires_at: Utc::now(),
        };
        assert_eq!(event.event_type(), "hold_placed");
        assert_eq!(event.event_id(), Some("evt-1"));
        assert_eq!(event.user_id(), Some("buyer-x"));
    }

    #[test]
    fn test_classifier_status_change_has_no_user() {
        let event = AuditEvent::StatusChanged {
            event_id: "evt-1".to_string(),
            from_status: "proximo".to_string(),
            to_status: "mañana".to_string(),
            changed_by: None,
        };
        assert_eq!(event.user_id(), None);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = AuditEvent::HoldsExpired {
            event_id: "evt-1".to_string(),
            seats: vec!["sec-a/row-1/s1-1".to_string()],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"holds_expired\""));

        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, AuditEvent::HoldsExpired { seats, .. } if seats.len() == 1));
    }

    #[test]
    fn test_audit_record_serialize() {
        let record = AuditRecord {
            id: 1,
            timestamp: Utc::now(),
            event_type: "service_started".to_string(),
            event_id: None,
            user_id: None,
            data: AuditEvent::ServiceStarted {
                version: "0.1.0".to_string(),
                config_hash: "abc123".to_string(),
            },
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"event_type\":\"service_started\""));
    }
}
