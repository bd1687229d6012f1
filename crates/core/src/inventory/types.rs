//! Core inventory data types.
//!
//! An [`Event`] is the unit of persistence and mutation: its price tiers and
//! its Sector → Row → Seat tree are embedded in the same document and always
//! read and written together.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Event status
// ============================================================================

/// Display status of an event.
///
/// `Cancelado` and `Liquidado` are administrative and sticky: nothing
/// automatic ever moves an event out of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum EventStatus {
    #[default]
    #[serde(rename = "proximo")]
    Proximo,
    #[serde(rename = "mañana")]
    Manana,
    #[serde(rename = "hoy")]
    Hoy,
    #[serde(rename = "finalizado")]
    Finalizado,
    #[serde(rename = "cancelado")]
    Cancelado,
    #[serde(rename = "liquidado")]
    Liquidado,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Proximo => "proximo",
            EventStatus::Manana => "mañana",
            EventStatus::Hoy => "hoy",
            EventStatus::Finalizado => "finalizado",
            EventStatus::Cancelado => "cancelado",
            EventStatus::Liquidado => "liquidado",
        }
    }

    /// Administratively finalized; skipped by the sweeper and the classifier.
    pub fn is_sticky(&self) -> bool {
        matches!(self, EventStatus::Cancelado | EventStatus::Liquidado)
    }

    /// Parse the wire name of a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "proximo" => Some(EventStatus::Proximo),
            "mañana" | "manana" => Some(EventStatus::Manana),
            "hoy" => Some(EventStatus::Hoy),
            "finalizado" => Some(EventStatus::Finalizado),
            "cancelado" => Some(EventStatus::Cancelado),
            "liquidado" => Some(EventStatus::Liquidado),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Price tiers
// ============================================================================

/// Anonymous stock at a single price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceTier {
    pub id: String,
    pub label: String,
    /// Unit price in minor currency units. Always > 0.
    pub price_cents: u64,
    /// Configured stock. Only an administrative stock edit changes it.
    pub capacity: u32,
    /// Units still sellable. Only checkout decrements it.
    pub remaining: u32,
    /// Sector whose seats this tier sells, for seated events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_id: Option<String>,
}

impl PriceTier {
    /// Units sold so far.
    pub fn sold(&self) -> u32 {
        self.capacity.saturating_sub(self.remaining)
    }

    pub fn is_sold_out(&self) -> bool {
        self.remaining == 0
    }
}

// ============================================================================
// Seat map
// ============================================================================

/// Optional drawing coordinates for seat maps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SeatPosition {
    pub x: f32,
    pub y: f32,
}

/// An individually addressable seat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub id: String,
    pub label: String,
    /// Permanent: set once a ticket is issued for this seat.
    #[serde(default)]
    pub occupied: bool,
    #[serde(default)]
    pub reserved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_expiry: Option<DateTime<Utc>>,
    /// Administrative enable flag, independent of occupancy.
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SeatPosition>,
}

fn default_true() -> bool {
    true
}

/// Derived reservation state of a seat at a given instant.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SeatState {
    Free,
    Reserved {
        holder: String,
        expires_at: DateTime<Utc>,
    },
    /// Reserved flag still set but the expiry has passed; the next sweep
    /// will clear it.
    Expired { holder: String },
    Occupied,
}

impl Seat {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            occupied: false,
            reserved: false,
            reserved_by: None,
            reservation_expiry: None,
            available: true,
            position: None,
        }
    }

    pub fn state(&self, now: DateTime<Utc>) -> SeatState {
        if self.occupied {
            return SeatState::Occupied;
        }
        match (self.reserved, &self.reserved_by, self.reservation_expiry) {
            (true, Some(holder), Some(expiry)) if !self.hold_expired(now) => SeatState::Reserved {
                holder: holder.clone(),
                expires_at: expiry,
            },
            (true, Some(holder), _) => SeatState::Expired {
                holder: holder.clone(),
            },
            _ => SeatState::Free,
        }
    }

    /// True when a hold exists and has not yet expired.
    pub fn has_live_hold(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state(now), SeatState::Reserved { .. })
    }

    /// True when the reserved flag is set but the expiry is in the past. A
    /// hold is still live at its expiry instant.
    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.reserved
            && self
                .reservation_expiry
                .map(|expiry| expiry < now)
                .unwrap_or(true)
    }

    pub fn is_held_by(&self, holder_id: &str) -> bool {
        self.reserved && self.reserved_by.as_deref() == Some(holder_id)
    }

    pub(crate) fn place_hold(&mut self, holder_id: &str, expiry: DateTime<Utc>) {
        self.reserved = true;
        self.reserved_by = Some(holder_id.to_string());
        self.reservation_expiry = Some(expiry);
    }

    pub(crate) fn clear_hold(&mut self) {
        self.reserved = false;
        self.reserved_by = None;
        self.reservation_expiry = None;
    }

    /// Convert the seat into a sold seat. Clears any hold.
    pub(crate) fn occupy(&mut self) {
        self.clear_hold();
        self.occupied = true;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Row {
    pub id: String,
    pub label: String,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub seats: Vec<Seat>,
}

impl Row {
    pub fn seat(&self, seat_id: &str) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == seat_id)
    }

    pub fn has_occupied_seats(&self) -> bool {
        self.seats.iter().any(|s| s.occupied)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sector {
    pub id: String,
    pub label: String,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Sector {
    pub fn row(&self, row_id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == row_id)
    }

    pub fn has_occupied_seats(&self) -> bool {
        self.rows.iter().any(Row::has_occupied_seats)
    }
}

/// Address of a seat inside an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatRef {
    pub sector_id: String,
    pub row_id: String,
    pub seat_id: String,
}

impl SeatRef {
    pub fn new(
        sector_id: impl Into<String>,
        row_id: impl Into<String>,
        seat_id: impl Into<String>,
    ) -> Self {
        Self {
            sector_id: sector_id.into(),
            row_id: row_id.into(),
            seat_id: seat_id.into(),
        }
    }
}

impl std::fmt::Display for SeatRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.sector_id, self.row_id, self.seat_id)
    }
}

/// A seat together with the labels needed to print it on a ticket.
#[derive(Debug, Clone)]
pub struct LocatedSeat<'a> {
    pub sector: &'a Sector,
    pub row: &'a Row,
    pub seat: &'a Seat,
}

impl LocatedSeat<'_> {
    /// Seat is enabled and so are its row and sector.
    pub fn is_available(&self) -> bool {
        self.sector.available && self.row.available && self.seat.available
    }
}

// ============================================================================
// Event
// ============================================================================

/// Root aggregate: one sellable event with its embedded inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub tiers: Vec<PriceTier>,
    /// Empty for tier-only events.
    #[serde(default)]
    pub sectors: Vec<Sector>,
    /// Tickets sold across all tiers.
    #[serde(default)]
    pub sold: u32,
    /// Optimistic-concurrency version, bumped by every successful save.
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_seated(&self) -> bool {
        !self.sectors.is_empty()
    }

    pub fn tier(&self, tier_id: &str) -> Option<&PriceTier> {
        self.tiers.iter().find(|t| t.id == tier_id)
    }

    pub(crate) fn tier_mut(&mut self, tier_id: &str) -> Option<&mut PriceTier> {
        self.tiers.iter_mut().find(|t| t.id == tier_id)
    }

    pub fn sector(&self, sector_id: &str) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.id == sector_id)
    }

    pub(crate) fn sector_mut(&mut self, sector_id: &str) -> Option<&mut Sector> {
        self.sectors.iter_mut().find(|s| s.id == sector_id)
    }

    pub fn locate(&self, seat: &SeatRef) -> Option<LocatedSeat<'_>> {
        let sector = self.sector(&seat.sector_id)?;
        let row = sector.row(&seat.row_id)?;
        let seat = row.seat(&seat.seat_id)?;
        Some(LocatedSeat { sector, row, seat })
    }

    pub(crate) fn seat_mut(&mut self, seat: &SeatRef) -> Option<&mut Seat> {
        self.sector_mut(&seat.sector_id)?
            .rows
            .iter_mut()
            .find(|r| r.id == seat.row_id)?
            .seats
            .iter_mut()
            .find(|s| s.id == seat.seat_id)
    }

    /// Every seat of the event.
    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.sectors
            .iter()
            .flat_map(|s| s.rows.iter())
            .flat_map(|r| r.seats.iter())
    }

    pub(crate) fn seats_mut(&mut self) -> impl Iterator<Item = &mut Seat> {
        self.sectors
            .iter_mut()
            .flat_map(|s| s.rows.iter_mut())
            .flat_map(|r| r.seats.iter_mut())
    }

    /// Remaining count of a tier, if the tier exists.
    pub fn tier_remaining(&self, tier_id: &str) -> Option<u32> {
        self.tier(tier_id).map(|t| t.remaining)
    }

    /// Reservation state of a seat, if the seat exists.
    pub fn seat_state(&self, seat: &SeatRef, now: DateTime<Utc>) -> Option<SeatState> {
        self.locate(seat).map(|located| located.seat.state(now))
    }

    /// List every model invariant currently broken. Empty means consistent.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for tier in &self.tiers {
            if tier.remaining > tier.capacity {
                violations.push(format!(
                    "tier {} remaining {} exceeds capacity {}",
                    tier.id, tier.remaining, tier.capacity
                ));
            }
            if tier.price_cents == 0 {
                violations.push(format!("tier {} has zero price", tier.id));
            }
        }

        let tier_sold: u32 = self.tiers.iter().map(PriceTier::sold).sum();
        if tier_sold != self.sold {
            violations.push(format!(
                "event sold counter {} differs from tier total {}",
                self.sold, tier_sold
            ));
        }

        for seat in self.seats() {
            if seat.occupied && (seat.reserved || seat.reserved_by.is_some()) {
                violations.push(format!("seat {} is occupied and held", seat.id));
            }
            if seat.reserved && seat.reserved_by.is_none() {
                violations.push(format!("seat {} is reserved without holder", seat.id));
            }
        }

        violations
    }
}
