//! Reclaims seat holds whose expiry has passed.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::audit::{record, AuditEvent, AuditHandle};
use crate::clock::Clock;
use crate::inventory::{Event, EventFilter, EventWriter, SeatRef, StoreError};
use crate::metrics::{HOLDS_EXPIRED, PASS_DURATION, PASS_FAILURES};

/// An event the pass had to skip.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PassFailure {
    pub event_id: String,
    pub error: String,
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SweepReport {
    pub events_scanned: usize,
    pub events_updated: usize,
    pub holds_released: usize,
    pub failures: Vec<PassFailure>,
}

/// Seats of `event` whose hold expired strictly before `now`.
pub fn expired_holds(event: &Event, now: DateTime<Utc>) -> Vec<SeatRef> {
    let mut expired = Vec::new();
    for sector in &event.sectors {
        for row in &sector.rows {
            for seat in row.seats.iter().filter(|s| s.hold_expired(now)) {
                expired.push(SeatRef::new(&sector.id, &row.id, &seat.id));
            }
        }
    }
    expired
}

/// Clears expired holds without a holder check.
pub struct ExpirySweeper {
    writer: EventWriter,
    clock: Arc<dyn Clock>,
    audit: Option<AuditHandle>,
}

impl ExpirySweeper {
    pub fn new(writer: EventWriter, clock: Arc<dyn Clock>, audit: Option<AuditHandle>) -> Self {
        Self {
            writer,
            clock,
            audit,
        }
    }

    /// Scan every non-sticky event once.
    ///
    /// Only a failure to list event ids fails the pass. A failure on one
    /// event, including a document that no longer decodes, is logged,
    /// reported and skipped.
    pub fn sweep_once(&self) -> Result<SweepReport, StoreError> {
        let started = Instant::now();
        let now = self.clock.now();
        let event_ids = self
            .writer
            .store()
            .list_ids(&EventFilter::all().excluding_sticky())?;

        let mut report = SweepReport {
            events_scanned: event_ids.len(),
            ..Default::default()
        };

        for event_id in event_ids {
            match self.sweep_event(&event_id, now) {
                Ok(released) if released.is_empty() => {}
                Ok(released) => {
                    debug!("Released {} expired holds on event {}", released.len(), event_id);
                    HOLDS_EXPIRED.inc_by(released.len() as u64);
                    report.events_updated += 1;
                    report.holds_released += released.len();
                    record(
                        &self.audit,
                        AuditEvent::HoldsExpired {
                            event_id: event_id.clone(),
                            seats: released.iter().map(SeatRef::to_string).collect(),
                        },
                    );
                }
                Err(e) => {
                    error!("Sweep failed for event {}: {}", event_id, e);
                    PASS_FAILURES.with_label_values(&["sweep"]).inc();
                    report.failures.push(PassFailure {
                        event_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        PASS_DURATION
            .with_label_values(&["sweep"])
            .observe(started.elapsed().as_secs_f64());
        if report.holds_released > 0 || !report.failures.is_empty() {
            info!(
                "Sweep released {} holds on {} events ({} failures)",
                report.holds_released,
                report.events_updated,
                report.failures.len()
            );
        }

        Ok(report)
    }

    /// Clear expired holds of one event in a single write. The copy is
    /// reloaded under the event lock, so holds refreshed since the scan stay.
    fn sweep_event(&self, event_id: &str, now: DateTime<Utc>) -> Result<Vec<SeatRef>, StoreError> {
        match self.writer.store().get(event_id)? {
            Some(event) if !expired_holds(&event, now).is_empty() => {}
            _ => return Ok(Vec::new()),
        }

        let written = self.writer.mutate_if_changed(event_id, |event| {
            if event.status.is_sticky() {
                return Ok::<_, StoreError>(None);
            }
            let expired = expired_holds(event, now);
            if expired.is_empty() {
                return Ok(None);
            }
            for seat_ref in &expired {
                if let Some(seat) = event.seat_mut(seat_ref) {
                    seat.clear_hold();
                }
            }
            Ok(Some(expired))
        })?;

        Ok(written.map(|(_, released)| released).unwrap_or_default())
    }
}
