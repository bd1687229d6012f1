//! Persisted orders and their tickets.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteOrderStore;
pub use store::{OrderError, OrderStore};
pub use types::{
    generate_verifier_code, normalize_verifier_code, BuyerContact, EventSnapshot, Order,
    OrderStatus, Ticket, VERIFIER_CODE_LEN,
};
