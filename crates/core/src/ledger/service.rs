use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use crate::audit::{record, AuditEvent, AuditHandle};
use crate::clock::Clock;
use crate::inventory::{Event, EventStatus, EventWriter, SeatRef};
use crate::metrics::{AVAILABILITY_TOGGLES, HOLDS_PLACED, HOLDS_RELEASED, HOLD_REJECTIONS};

use super::{HoldReceipt, LedgerConfig, LedgerError, ToggleOutcome, ToggleScope};

/// Places and releases seat holds, and flips availability flags.
pub struct ReservationLedger {
    writer: EventWriter,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
    audit: Option<AuditHandle>,
}

fn rejected(e: LedgerError) -> LedgerError {
    HOLD_REJECTIONS.with_label_values(&[e.reason()]).inc();
    debug!("Ledger request rejected: {}", e);
    e
}

fn ensure_open(event: &Event) -> Result<(), LedgerError> {
    if event.status.is_sticky() || event.status == EventStatus::Finalizado {
        return Err(LedgerError::EventClosed(event.status));
    }
    Ok(())
}

impl ReservationLedger {
    pub fn new(
        writer: EventWriter,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
        audit: Option<AuditHandle>,
    ) -> Self {
        Self {
            writer,
            clock,
            config,
            audit,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Hold a seat for `holder_id` for `ttl_secs` (default and cap from
    /// [`LedgerConfig`]).
    ///
    /// The same holder placing a hold again refreshes its expiry. A hold
    /// whose expiry has passed no longer blocks anyone, even before the
    /// sweep clears it.
    pub fn place_hold(
        &self,
        event_id: &str,
        seat: &SeatRef,
        holder_id: &str,
        ttl_secs: Option<u64>,
    ) -> Result<HoldReceipt, LedgerError> {
        if holder_id.trim().is_empty() {
            return Err(rejected(LedgerError::Invalid("holder id is empty".to_string())));
        }
        let ttl = self.config.effective_ttl(ttl_secs).map_err(rejected)?;

        let (_, expires_at) = self
            .writer
            .mutate(event_id, |event| {
                ensure_open(event)?;
                let now = self.clock.now();

                let located = event
                    .locate(seat)
                    .ok_or_else(|| LedgerError::SeatNotFound(seat.clone()))?;
                if located.seat.occupied {
                    return Err(LedgerError::AlreadyOccupied(seat.clone()));
                }
                if !located.is_available() {
                    return Err(LedgerError::Unavailable(seat.clone()));
                }
                if located.seat.has_live_hold(now) && !located.seat.is_held_by(holder_id) {
                    return Err(LedgerError::AlreadyReserved(seat.clone()));
                }

                let expires_at = now + Duration::seconds(ttl as i64);
                if let Some(target) = event.seat_mut(seat) {
                    target.place_hold(holder_id, expires_at);
                }
                Ok(expires_at)
            })
            .map_err(rejected)?;

        HOLDS_PLACED.inc();
        debug!(
            "Seat {} of event {} held by {} until {}",
            seat, event_id, holder_id, expires_at
        );
        record(
            &self.audit,
            AuditEvent::HoldPlaced {
                event_id: event_id.to_string(),
                seat: seat.to_string(),
                holder_id: holder_id.to_string(),
                expires_at,
            },
        );

        Ok(HoldReceipt {
            event_id: event_id.to_string(),
            seat: seat.clone(),
            holder_id: holder_id.to_string(),
            expires_at,
        })
    }

    /// Release a hold owned by `holder_id`.
    pub fn release_hold(
        &self,
        event_id: &str,
        seat: &SeatRef,
        holder_id: &str,
    ) -> Result<(), LedgerError> {
        self.writer
            .mutate(event_id, |event| {
                let target = event
                    .seat_mut(seat)
                    .ok_or_else(|| LedgerError::SeatNotFound(seat.clone()))?;
                if !target.reserved {
                    return Err(LedgerError::NotReserved(seat.clone()));
                }
                if !target.is_held_by(holder_id) {
                    return Err(LedgerError::NotHeldByCaller(seat.clone()));
                }
                target.clear_hold();
                Ok(())
            })
            .map_err(rejected)?;

        HOLDS_RELEASED.inc();
        debug!("Seat {} of event {} released by {}", seat, event_id, holder_id);
        record(
            &self.audit,
            AuditEvent::HoldReleased {
                event_id: event_id.to_string(),
                seat: seat.to_string(),
                holder_id: holder_id.to_string(),
            },
        );
        Ok(())
    }

    /// Flip the `available` flag of a sector, row or seat.
    ///
    /// The new value is copied onto every row and every non-occupied seat
    /// below the target, in both directions: re-enabling a sector also
    /// re-enables seats that were disabled on their own before.
    pub fn toggle_availability(
        &self,
        event_id: &str,
        scope: &ToggleScope,
        actor: &str,
    ) -> Result<ToggleOutcome, LedgerError> {
        let (_, (available, cascaded)) = self
            .writer
            .mutate(event_id, |event| apply_toggle(event, scope))
            .map_err(rejected)?;

        AVAILABILITY_TOGGLES.with_label_values(&[scope.name()]).inc();
        info!(
            "Event {} {} {} set available={} ({} descendants) by {}",
            event_id,
            scope.name(),
            scope.target(),
            available,
            cascaded,
            actor
        );
        record(
            &self.audit,
            AuditEvent::AvailabilityToggled {
                event_id: event_id.to_string(),
                scope: scope.name().to_string(),
                target: scope.target(),
                available,
                changed_by: actor.to_string(),
            },
        );

        Ok(ToggleOutcome {
            scope: scope.clone(),
            available,
            cascaded,
        })
    }
}

/// Returns the new flag value and how many descendants were overwritten.
fn apply_toggle(event: &mut Event, scope: &ToggleScope) -> Result<(bool, usize), LedgerError> {
    match scope {
        ToggleScope::Sector { sector_id } => {
            let sector = event
                .sector_mut(sector_id)
                .ok_or_else(|| LedgerError::SectorNotFound(sector_id.clone()))?;
            let available = !sector.available;
            sector.available = available;

            let mut cascaded = 0;
            for row in sector.rows.iter_mut() {
                row.available = available;
                cascaded += 1;
                for seat in row.seats.iter_mut().filter(|s| !s.occupied) {
                    seat.available = available;
                    cascaded += 1;
                }
            }
            Ok((available, cascaded))
        }
        ToggleScope::Row { sector_id, row_id } => {
            let row = event
                .sector_mut(sector_id)
                .ok_or_else(|| LedgerError::SectorNotFound(sector_id.clone()))?
                .rows
                .iter_mut()
                .find(|r| r.id == *row_id)
                .ok_or_else(|| LedgerError::RowNotFound(row_id.clone()))?;
            let available = !row.available;
            row.available = available;

            let mut cascaded = 0;
            for seat in row.seats.iter_mut().filter(|s| !s.occupied) {
                seat.available = available;
                cascaded += 1;
            }
            Ok((available, cascaded))
        }
        ToggleScope::Seat { seat: seat_ref } => {
            let seat = event
                .seat_mut(seat_ref)
                .ok_or_else(|| LedgerError::SeatNotFound(seat_ref.clone()))?;
            let available = !seat.available;
            if !available && seat.occupied {
                return Err(LedgerError::OccupiedSeatToggle(seat_ref.clone()));
            }
            seat.available = available;
            Ok((available, 0))
        }
    }
}
