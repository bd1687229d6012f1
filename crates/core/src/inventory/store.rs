//! Event storage trait and types.

use thiserror::Error;

use crate::error::ErrorKind;

use super::{Event, EventStatus};

/// Error type for event storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event not found: {0}")]
    NotFound(String),

    /// The stored document moved on since it was loaded.
    #[error("version conflict on event {event_id}: expected version {expected}")]
    VersionConflict { event_id: String, expected: i64 },

    #[error("event already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::VersionConflict { .. } | StoreError::AlreadyExists(_) => {
                ErrorKind::Conflict
            }
            StoreError::Database(_) | StoreError::Serialization(_) => ErrorKind::Transient,
        }
    }
}

/// Filter for listing events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub seller_id: Option<String>,
    /// Skip events in `cancelado` / `liquidado`.
    pub exclude_sticky: bool,
    pub limit: i64,
    pub offset: i64,
}

impl EventFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    /// Every event regardless of pagination, for background passes.
    pub fn all() -> Self {
        Self {
            limit: i64::MAX,
            ..Self::new()
        }
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_seller_id(mut self, seller_id: impl Into<String>) -> Self {
        self.seller_id = Some(seller_id.into());
        self
    }

    pub fn excluding_sticky(mut self) -> Self {
        self.exclude_sticky = true;
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

/// Trait for event storage backends.
///
/// Implementations persist the whole aggregate as one document.
pub trait EventStore: Send + Sync {
    /// Insert a new event. Its version is stored as given.
    fn create(&self, event: &Event) -> Result<(), StoreError>;

    /// Get an event by ID.
    fn get(&self, id: &str) -> Result<Option<Event>, StoreError>;

    /// List events matching the filter, ordered by date.
    fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError>;

    /// IDs of the events matching the filter, ordered by date. Documents are
    /// not decoded, so an unreadable event still shows up here.
    fn list_ids(&self, filter: &EventFilter) -> Result<Vec<String>, StoreError>;

    /// Count events matching the filter.
    fn count(&self, filter: &EventFilter) -> Result<i64, StoreError>;

    /// Write the aggregate back if the stored version still equals
    /// `event.version`. Returns the event carrying its new version.
    fn save(&self, event: &Event) -> Result<Event, StoreError>;
}
