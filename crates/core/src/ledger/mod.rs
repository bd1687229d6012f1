//! Seat holds and administrative availability toggles.
//!
//! Every change goes through [`EventWriter`](crate::inventory::EventWriter),
//! so it is serialized per event and version-checked.

mod service;
mod types;

pub use service::ReservationLedger;
pub use types::{HoldReceipt, LedgerConfig, LedgerError, ToggleOutcome, ToggleScope};
