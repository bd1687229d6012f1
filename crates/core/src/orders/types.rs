//! Order and ticket documents.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::{Event, SeatRef};

/// Length of a verifier code in hex characters.
pub const VERIFIER_CODE_LEN: usize = 16;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Every committed order starts here; payment settlement happens elsewhere.
    #[default]
    Pending,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buyer contact as given at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuyerContact {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// What the event looked like when the order was placed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventSnapshot {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_id: Option<String>,
}

impl From<&Event> for EventSnapshot {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            name: event.name.clone(),
            date: event.date,
            time: event.time,
            venue_id: event.venue_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: String,
    pub tier_id: String,
    pub tier_label: String,
    pub amount_cents: u64,
    /// Unique across all orders; presented at the gate.
    pub verifier_code: String,
    pub holder_name: String,
    pub holder_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat: Option<SeatRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_label: Option<String>,
    #[serde(default)]
    pub used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    pub buyer: BuyerContact,
    pub event: EventSnapshot,
    pub tickets: Vec<Ticket>,
    pub total_cents: u64,
    pub payment_method: String,
    #[serde(default)]
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn ticket_by_code(&self, code: &str) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.verifier_code == code)
    }

    pub(crate) fn ticket_by_code_mut(&mut self, code: &str) -> Option<&mut Ticket> {
        self.tickets.iter_mut().find(|t| t.verifier_code == code)
    }

    pub fn used_count(&self) -> usize {
        self.tickets.iter().filter(|t| t.used).count()
    }
}

/// New random verifier code: 16 uppercase hex characters.
pub fn generate_verifier_code() -> String {
    let mut code = Uuid::new_v4().simple().to_string().to_uppercase();
    code.truncate(VERIFIER_CODE_LEN);
    code
}

/// Normalize a code typed or scanned at the gate.
pub fn normalize_verifier_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_code_shape() {
        let code = generate_verifier_code();
        assert_eq!(code.len(), VERIFIER_CODE_LEN);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(code, generate_verifier_code());
    }

    #[test]
    fn test_normalize_verifier_code() {
        assert_eq!(normalize_verifier_code("  ab12cd\n"), "AB12CD");
    }

    #[test]
    fn test_order_status_default_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(
            serde_json::to_string(&OrderStatus::Pending).unwrap(),
            "\"pending\""
        );
    }
}
