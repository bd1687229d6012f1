//! Administrative inventory edits and read accessors.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{record, AuditEvent, AuditHandle};
use crate::classifier::classify;
use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::metrics::STATUS_TRANSITIONS;

use super::{
    Event, EventFilter, EventStatus, EventWriter, PriceTier, Row, Seat, SeatPosition, SeatRef,
    SeatState, Sector, StoreError,
};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("tier not found: {0}")]
    TierNotFound(String),

    #[error("sector not found: {0}")]
    SectorNotFound(String),

    #[error("row not found: {0}")]
    RowNotFound(String),

    #[error("seat not found: {0}")]
    SeatNotFound(SeatRef),

    #[error("invalid inventory: {0}")]
    Invalid(String),

    #[error("status {0} cannot be set manually")]
    StatusNotSettable(EventStatus),

    #[error("tier {tier_id} capacity {capacity} is below the {sold} units already sold")]
    CapacityBelowSold {
        tier_id: String,
        capacity: u32,
        sold: u32,
    },

    #[error("{0} has occupied seats")]
    HasOccupiedSeats(String),

    #[error("event already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for InventoryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => InventoryError::EventNotFound(id),
            StoreError::AlreadyExists(id) => InventoryError::AlreadyExists(id),
            other => InventoryError::Store(other),
        }
    }
}

impl InventoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::EventNotFound(_)
            | InventoryError::TierNotFound(_)
            | InventoryError::SectorNotFound(_)
            | InventoryError::RowNotFound(_)
            | InventoryError::SeatNotFound(_) => ErrorKind::NotFound,
            InventoryError::Invalid(_) | InventoryError::StatusNotSettable(_) => {
                ErrorKind::Invalid
            }
            InventoryError::CapacityBelowSold { .. }
            | InventoryError::HasOccupiedSeats(_)
            | InventoryError::AlreadyExists(_) => ErrorKind::Conflict,
            InventoryError::Store(e) => e.kind(),
        }
    }
}

// ============================================================================
// Creation requests
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewTier {
    #[serde(default)]
    pub id: Option<String>,
    pub label: String,
    pub price_cents: u64,
    pub capacity: u32,
    #[serde(default)]
    pub sector_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSeat {
    #[serde(default)]
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub position: Option<SeatPosition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRow {
    #[serde(default)]
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub seats: Vec<NewSeat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSector {
    #[serde(default)]
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub rows: Vec<NewRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub venue_id: Option<String>,
    #[serde(default)]
    pub seller_id: Option<String>,
    pub tiers: Vec<NewTier>,
    /// Leave empty for a tier-only event.
    #[serde(default)]
    pub sectors: Vec<NewSector>,
}

fn id_or_new(id: Option<String>) -> String {
    id.filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn check_unique<'a>(
    what: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), InventoryError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(InventoryError::Invalid(format!("duplicate {} id {}", what, id)));
        }
    }
    Ok(())
}

fn build_tier(new: NewTier, event: &Event) -> Result<PriceTier, InventoryError> {
    if new.label.trim().is_empty() {
        return Err(InventoryError::Invalid("tier label is empty".to_string()));
    }
    if new.price_cents == 0 {
        return Err(InventoryError::Invalid(format!(
            "tier {} must have a positive price",
            new.label
        )));
    }
    if new.capacity == 0 {
        return Err(InventoryError::Invalid(format!(
            "tier {} must have a capacity of at least 1",
            new.label
        )));
    }
    if let Some(ref sector_id) = new.sector_id {
        if !event.is_seated() {
            return Err(InventoryError::Invalid(format!(
                "tier {} links sector {} but the event has no seat map",
                new.label, sector_id
            )));
        }
        if event.sector(sector_id).is_none() {
            return Err(InventoryError::SectorNotFound(sector_id.clone()));
        }
    }

    let tier = PriceTier {
        id: id_or_new(new.id),
        label: new.label,
        price_cents: new.price_cents,
        capacity: new.capacity,
        remaining: new.capacity,
        sector_id: new.sector_id,
    };

    if event.tier(&tier.id).is_some() {
        return Err(InventoryError::Invalid(format!("duplicate tier id {}", tier.id)));
    }
    Ok(tier)
}

fn build_sector(new: NewSector) -> Result<Sector, InventoryError> {
    let rows = new
        .rows
        .into_iter()
        .map(|row| {
            let seats = row
                .seats
                .into_iter()
                .map(|seat| {
                    let mut built = Seat::new(id_or_new(seat.id), seat.label);
                    built.position = seat.position;
                    built
                })
                .collect::<Vec<_>>();
            check_unique("seat", seats.iter().map(|s| s.id.as_str()))?;
            Ok(Row {
                id: id_or_new(row.id),
                label: row.label,
                available: true,
                seats,
            })
        })
        .collect::<Result<Vec<_>, InventoryError>>()?;
    check_unique("row", rows.iter().map(|r| r.id.as_str()))?;

    Ok(Sector {
        id: id_or_new(new.id),
        label: new.label,
        available: true,
        rows,
    })
}

// ============================================================================
// Service
// ============================================================================

/// Creates events and applies staff edits that are neither holds nor sales.
pub struct InventoryService {
    writer: EventWriter,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    audit: Option<AuditHandle>,
}

impl InventoryService {
    pub fn new(writer: EventWriter, clock: Arc<dyn Clock>, audit: Option<AuditHandle>) -> Self {
        Self {
            writer,
            clock,
            offset: Utc.fix(),
            audit,
        }
    }

    /// Calendar offset used to pick the status of new events.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn create_event(&self, new: NewEvent, actor: &str) -> Result<Event, InventoryError> {
        if new.name.trim().is_empty() {
            return Err(InventoryError::Invalid("event name is empty".to_string()));
        }
        if new.tiers.is_empty() {
            return Err(InventoryError::Invalid(
                "event needs at least one price tier".to_string(),
            ));
        }

        let now = self.clock.now();
        let sectors = new
            .sectors
            .into_iter()
            .map(build_sector)
            .collect::<Result<Vec<_>, _>>()?;
        check_unique("sector", sectors.iter().map(|s| s.id.as_str()))?;

        let mut event = Event {
            id: id_or_new(new.id),
            name: new.name,
            date: new.date,
            time: new.time,
            description: new.description,
            status: classify(
                now.with_timezone(&self.offset).date_naive(),
                new.date,
                EventStatus::Proximo,
            ),
            image: new.image,
            category_id: new.category_id,
            venue_id: new.venue_id,
            seller_id: new.seller_id,
            tiers: Vec::new(),
            sectors,
            sold: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        for tier in new.tiers {
            let tier = build_tier(tier, &event)?;
            event.tiers.push(tier);
        }

        self.writer.store().create(&event)?;

        info!(
            "Created event {} ({}, {} tiers, {} seats)",
            event.id,
            event.name,
            event.tiers.len(),
            event.seats().count()
        );
        record(
            &self.audit,
            AuditEvent::EventCreated {
                event_id: event.id.clone(),
                created_by: actor.to_string(),
                name: event.name.clone(),
                date: event.date,
                seated: event.is_seated(),
            },
        );

        Ok(event)
    }

    pub fn get_event(&self, event_id: &str) -> Result<Event, InventoryError> {
        self.writer
            .store()
            .get(event_id)?
            .ok_or_else(|| InventoryError::EventNotFound(event_id.to_string()))
    }

    pub fn list_events(&self, filter: &EventFilter) -> Result<(Vec<Event>, i64), InventoryError> {
        let store = self.writer.store();
        let events = store.list(filter)?;
        let total = store.count(filter)?;
        Ok((events, total))
    }

    /// The Sector → Row → Seat tree of an event.
    pub fn sectors(&self, event_id: &str) -> Result<Vec<Sector>, InventoryError> {
        Ok(self.get_event(event_id)?.sectors)
    }

    pub fn tier_remaining(&self, event_id: &str, tier_id: &str) -> Result<u32, InventoryError> {
        self.get_event(event_id)?
            .tier_remaining(tier_id)
            .ok_or_else(|| InventoryError::TierNotFound(tier_id.to_string()))
    }

    /// Reservation state of a seat as of now.
    pub fn seat_state(&self, event_id: &str, seat: &SeatRef) -> Result<SeatState, InventoryError> {
        self.get_event(event_id)?
            .seat_state(seat, self.clock.now())
            .ok_or_else(|| InventoryError::SeatNotFound(seat.clone()))
    }

    pub fn add_tier(
        &self,
        event_id: &str,
        new: NewTier,
        actor: &str,
    ) -> Result<PriceTier, InventoryError> {
        let (_, tier) = self.writer.mutate(event_id, |event| {
            let tier = build_tier(new.clone(), event)?;
            event.tiers.push(tier.clone());
            Ok::<_, InventoryError>(tier)
        })?;

        debug!("Added tier {} to event {}", tier.id, event_id);
        record(
            &self.audit,
            AuditEvent::TierAdded {
                event_id: event_id.to_string(),
                tier_id: tier.id.clone(),
                price_cents: tier.price_cents,
                capacity: tier.capacity,
                added_by: actor.to_string(),
            },
        );
        Ok(tier)
    }

    /// Change a tier's configured stock. Units already sold stay sold:
    /// `remaining` becomes `capacity - sold`.
    pub fn set_tier_capacity(
        &self,
        event_id: &str,
        tier_id: &str,
        capacity: u32,
        actor: &str,
    ) -> Result<PriceTier, InventoryError> {
        if capacity == 0 {
            return Err(InventoryError::Invalid(
                "capacity must be at least 1".to_string(),
            ));
        }

        let (_, (previous, tier)) = self.writer.mutate(event_id, |event| {
            let tier = event
                .tier_mut(tier_id)
                .ok_or_else(|| InventoryError::TierNotFound(tier_id.to_string()))?;
            let sold = tier.sold();
            if capacity < sold {
                return Err(InventoryError::CapacityBelowSold {
                    tier_id: tier_id.to_string(),
                    capacity,
                    sold,
                });
            }
            let previous = tier.capacity;
            tier.capacity = capacity;
            tier.remaining = capacity - sold;
            Ok((previous, tier.clone()))
        })?;

        info!(
            "Tier {} of event {} capacity {} -> {} ({} remaining)",
            tier_id, event_id, previous, tier.capacity, tier.remaining
        );
        record(
            &self.audit,
            AuditEvent::StockAdjusted {
                event_id: event_id.to_string(),
                tier_id: tier_id.to_string(),
                previous_capacity: previous,
                capacity: tier.capacity,
                remaining: tier.remaining,
                changed_by: actor.to_string(),
            },
        );
        Ok(tier)
    }

    /// Staff override into one of the sticky administrative states.
    pub fn set_status(
        &self,
        event_id: &str,
        status: EventStatus,
        actor: &str,
    ) -> Result<Event, InventoryError> {
        if !status.is_sticky() {
            return Err(InventoryError::StatusNotSettable(status));
        }

        let (event, previous) = self.writer.mutate(event_id, |event| {
            let previous = event.status;
            event.status = status;
            Ok::<_, InventoryError>(previous)
        })?;

        if previous != status {
            info!("Event {} status {} -> {} by {}", event_id, previous, status, actor);
            STATUS_TRANSITIONS.with_label_values(&[status.as_str()]).inc();
            record(
                &self.audit,
                AuditEvent::StatusChanged {
                    event_id: event_id.to_string(),
                    from_status: previous.to_string(),
                    to_status: status.to_string(),
                    changed_by: Some(actor.to_string()),
                },
            );
        }
        Ok(event)
    }

    /// Remove a sector. Tiers that sold it are unlinked.
    pub fn delete_sector(
        &self,
        event_id: &str,
        sector_id: &str,
        actor: &str,
    ) -> Result<Event, InventoryError> {
        let (event, _) = self.writer.mutate(event_id, |event| {
            let sector = event
                .sector(sector_id)
                .ok_or_else(|| InventoryError::SectorNotFound(sector_id.to_string()))?;
            if sector.has_occupied_seats() {
                return Err(InventoryError::HasOccupiedSeats(format!("sector {}", sector_id)));
            }
            event.sectors.retain(|s| s.id != sector_id);
            for tier in event.tiers.iter_mut() {
                if tier.sector_id.as_deref() == Some(sector_id) {
                    tier.sector_id = None;
                }
            }
            Ok(())
        })?;

        info!("Deleted sector {} of event {}", sector_id, event_id);
        record(
            &self.audit,
            AuditEvent::SectorDeleted {
                event_id: event_id.to_string(),
                sector_id: sector_id.to_string(),
                deleted_by: actor.to_string(),
            },
        );
        Ok(event)
    }

    pub fn delete_row(
        &self,
        event_id: &str,
        sector_id: &str,
        row_id: &str,
        actor: &str,
    ) -> Result<Event, InventoryError> {
        let (event, _) = self.writer.mutate(event_id, |event| {
            let sector = event
                .sector_mut(sector_id)
                .ok_or_else(|| InventoryError::SectorNotFound(sector_id.to_string()))?;
            let row = sector
                .row(row_id)
                .ok_or_else(|| InventoryError::RowNotFound(row_id.to_string()))?;
            if row.has_occupied_seats() {
                return Err(InventoryError::HasOccupiedSeats(format!("row {}", row_id)));
            }
            sector.rows.retain(|r| r.id != row_id);
            Ok(())
        })?;

        info!("Deleted row {}/{} of event {}", sector_id, row_id, event_id);
        record(
            &self.audit,
            AuditEvent::RowDeleted {
                event_id: event_id.to_string(),
                sector_id: sector_id.to_string(),
                row_id: row_id.to_string(),
                deleted_by: actor.to_string(),
            },
        );
        Ok(event)
    }
}
