//! Events and their embedded inventory: price tiers and the
//! Sector → Row → Seat map.

mod admin;
mod sqlite_store;
mod store;
mod types;
mod writer;

pub use admin::{InventoryError, InventoryService, NewEvent, NewRow, NewSeat, NewSector, NewTier};
pub use sqlite_store::SqliteEventStore;
pub use store::{EventFilter, EventStore, StoreError};
pub use types::{
    Event, EventStatus, LocatedSeat, PriceTier, Row, Seat, SeatPosition, SeatRef, SeatState,
    Sector,
};
pub use writer::{EventLocks, EventWriter, DEFAULT_MAX_WRITE_RETRIES};
