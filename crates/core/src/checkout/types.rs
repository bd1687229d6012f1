use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::inventory::{EventStatus, SeatRef, StoreError};
use crate::orders::{BuyerContact, OrderError};

/// One ticket of a checkout: a tier and, on seated events, a seat the holder
/// already holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketRequest {
    pub tier_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat: Option<SeatRef>,
    /// Defaults to the buyer's name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendee_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendee_email: Option<String>,
}

impl TicketRequest {
    pub fn tier(tier_id: impl Into<String>) -> Self {
        Self {
            tier_id: tier_id.into(),
            seat: None,
            attendee_name: None,
            attendee_email: None,
        }
    }

    pub fn seat(tier_id: impl Into<String>, seat: SeatRef) -> Self {
        Self {
            seat: Some(seat),
            ..Self::tier(tier_id)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub event_id: String,
    /// Identity whose seat holds are converted into tickets.
    pub holder_id: String,
    pub buyer: BuyerContact,
    pub payment_method: String,
    pub tickets: Vec<TicketRequest>,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("event is {0} and no longer sells tickets")]
    EventClosed(EventStatus),

    #[error("order has no tickets")]
    EmptyOrder,

    #[error("tier not found: {0}")]
    TierNotFound(String),

    #[error("tier {0} is sold out")]
    SoldOut(String),

    #[error("event has no seats, but a seat was requested")]
    SeatOnTierEvent,

    #[error("tier {0} needs a seat on a seated event")]
    SeatRequired(String),

    #[error("seat not found: {0}")]
    SeatNotFound(SeatRef),

    #[error("seat {0} requested twice")]
    DuplicateSeat(SeatRef),

    #[error("seat {seat} is not sold through tier {tier_id}")]
    SeatOutsideTier { seat: SeatRef, tier_id: String },

    #[error("seat {0} is already sold")]
    SeatOccupied(SeatRef),

    #[error("seat {0} is not available")]
    SeatUnavailable(SeatRef),

    #[error("seat {0} is not held by the buyer")]
    SeatNotHeld(SeatRef),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(StoreError),

    /// The order could not be written; inventory was restored.
    #[error("order could not be recorded: {0}")]
    OrderWrite(OrderError),
}

impl From<StoreError> for CheckoutError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => CheckoutError::EventNotFound(id),
            other => CheckoutError::Store(other),
        }
    }
}

impl CheckoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::EventNotFound(_)
            | CheckoutError::TierNotFound(_)
            | CheckoutError::SeatNotFound(_) => ErrorKind::NotFound,
            CheckoutError::EventClosed(_)
            | CheckoutError::SoldOut(_)
            | CheckoutError::SeatOccupied(_)
            | CheckoutError::SeatUnavailable(_) => ErrorKind::Conflict,
            CheckoutError::SeatNotHeld(_) => ErrorKind::Unauthorized,
            CheckoutError::EmptyOrder
            | CheckoutError::SeatOnTierEvent
            | CheckoutError::SeatRequired(_)
            | CheckoutError::DuplicateSeat(_)
            | CheckoutError::SeatOutsideTier { .. }
            | CheckoutError::Invalid(_) => ErrorKind::Invalid,
            CheckoutError::Store(e) => e.kind(),
            CheckoutError::OrderWrite(_) => ErrorKind::Transient,
        }
    }

    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::EventNotFound(_) => "event_not_found",
            CheckoutError::EventClosed(_) => "event_closed",
            CheckoutError::EmptyOrder => "empty_order",
            CheckoutError::TierNotFound(_) => "tier_not_found",
            CheckoutError::SoldOut(_) => "sold_out",
            CheckoutError::SeatOnTierEvent => "seat_on_tier_event",
            CheckoutError::SeatRequired(_) => "seat_required",
            CheckoutError::SeatNotFound(_) => "seat_not_found",
            CheckoutError::DuplicateSeat(_) => "duplicate_seat",
            CheckoutError::SeatOutsideTier { .. } => "seat_outside_tier",
            CheckoutError::SeatOccupied(_) => "seat_occupied",
            CheckoutError::SeatUnavailable(_) => "seat_unavailable",
            CheckoutError::SeatNotHeld(_) => "seat_not_held",
            CheckoutError::Invalid(_) => "invalid",
            CheckoutError::Store(_) | CheckoutError::OrderWrite(_) => "storage",
        }
    }
}
