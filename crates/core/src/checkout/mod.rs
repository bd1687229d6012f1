//! Converts holds and tier selections into sold stock and a persisted order.
//!
//! The event write happens first. The order is written only after it
//! succeeds; if the order write then fails, a second event write puts the
//! stock and seats back.

mod service;
mod types;

pub use service::CheckoutService;
pub use types::{CheckoutError, CheckoutRequest, TicketRequest};
