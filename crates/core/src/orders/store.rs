//! Order storage trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::ErrorKind;

use super::Order;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found: {0}")]
    NotFound(String),

    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    #[error("ticket {code} belongs to event {actual}, not {expected}")]
    EventMismatch {
        code: String,
        expected: String,
        actual: String,
    },

    #[error("ticket {code} already used at {used_at}")]
    AlreadyUsed {
        code: String,
        used_at: DateTime<Utc>,
    },

    #[error("order already exists: {0}")]
    AlreadyExists(String),

    #[error("duplicate verifier code: {0}")]
    DuplicateCode(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::NotFound(_) | OrderError::TicketNotFound(_) => ErrorKind::NotFound,
            OrderError::EventMismatch { .. } => ErrorKind::Invalid,
            OrderError::AlreadyUsed { .. }
            | OrderError::AlreadyExists(_)
            | OrderError::DuplicateCode(_) => ErrorKind::Conflict,
            OrderError::Database(_) | OrderError::Serialization(_) => ErrorKind::Transient,
        }
    }
}

/// Trait for order storage backends.
///
/// Orders are immutable once inserted except for per-ticket `used` flips.
pub trait OrderStore: Send + Sync {
    /// Insert a new order and index its verifier codes.
    fn insert(&self, order: &Order) -> Result<(), OrderError>;

    fn get(&self, id: &str) -> Result<Option<Order>, OrderError>;

    /// Orders of one event, oldest first.
    fn list_for_event(&self, event_id: &str) -> Result<Vec<Order>, OrderError>;

    /// The order containing the ticket with this verifier code.
    fn find_by_code(&self, code: &str) -> Result<Option<Order>, OrderError>;

    /// Flip one ticket's `used` flag, atomically with respect to other
    /// callers of this method.
    ///
    /// Fails without changing anything if the code is unknown, belongs to a
    /// different event, or was already used. Returns the updated order.
    fn mark_ticket_used(
        &self,
        code: &str,
        event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Order, OrderError>;
}
