//! Testing utilities: a controllable clock, fixtures, and store wrappers that
//! inject failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use boletera_core::testing::{fixtures, ManualClock};
//!
//! let clock = ManualClock::at("2030-06-01T12:00:00Z");
//! let event = fixtures::seated_event("evt-1", 2, 10);
//!
//! // ...place a hold with a 60s TTL...
//! clock.advance_secs(61);
//! // ...the next sweep releases it.
//! ```

mod flaky_store;
mod manual_clock;

pub use flaky_store::{FlakyEventStore, FlakyOrderStore};
pub use manual_clock::ManualClock;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, NaiveDate, Utc};

    use crate::inventory::{Event, EventStatus, PriceTier, Row, Seat, Sector};
    use crate::orders::BuyerContact;

    /// Date every fixture event happens on.
    pub fn event_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 6, 15).expect("valid fixture date")
    }

    /// Fixed instant used as creation time.
    pub fn fixture_instant() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2030-06-01T12:00:00Z")
            .expect("valid fixture instant")
            .with_timezone(&Utc)
    }

    fn base_event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            name: format!("Evento {}", id),
            date: event_date(),
            time: None,
            description: String::new(),
            status: EventStatus::Proximo,
            image: None,
            category_id: None,
            venue_id: Some("venue-1".to_string()),
            seller_id: Some("seller-1".to_string()),
            tiers: Vec::new(),
            sectors: Vec::new(),
            sold: 0,
            version: 0,
            created_at: fixture_instant(),
            updated_at: fixture_instant(),
        }
    }

    /// A tier with nothing sold.
    pub fn tier(id: &str, price_cents: u64, capacity: u32) -> PriceTier {
        PriceTier {
            id: id.to_string(),
            label: id.to_string(),
            price_cents,
            capacity,
            remaining: capacity,
            sector_id: None,
        }
    }

    /// Tier-only event with a single `general` tier.
    pub fn tier_event(id: &str, capacity: u32) -> Event {
        let mut event = base_event(id);
        event.tiers.push(tier("general", 2500, capacity));
        event
    }

    /// Seated event with one sector `sec-a` of `rows` rows and
    /// `seats_per_row` seats each, sold through tier `platea`.
    ///
    /// Rows are `row-1..`, seats are `s{row}-{n}` (`s1-1` is the first seat).
    pub fn seated_event(id: &str, rows: u32, seats_per_row: u32) -> Event {
        let mut event = base_event(id);
        let rows = (1..=rows)
            .map(|r| Row {
                id: format!("row-{}", r),
                label: format!("Fila {}", r),
                available: true,
                seats: (1..=seats_per_row)
                    .map(|n| Seat::new(format!("s{}-{}", r, n), format!("{}{}", r, n)))
                    .collect(),
            })
            .collect::<Vec<_>>();
        let seat_count: u32 = rows.iter().map(|r| r.seats.len() as u32).sum();

        event.sectors.push(Sector {
            id: "sec-a".to_string(),
            label: "Platea".to_string(),
            available: true,
            rows,
        });

        let mut platea = tier("platea", 4000, seat_count);
        platea.sector_id = Some("sec-a".to_string());
        event.tiers.push(platea);
        event
    }

    pub fn buyer() -> BuyerContact {
        BuyerContact {
            name: "Ana Torres".to_string(),
            email: "ana@example.com".to_string(),
            phone: None,
        }
    }
}
