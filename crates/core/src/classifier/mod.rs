//! Derives an event's display status from its date.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::audit::{record, AuditEvent, AuditHandle};
use crate::clock::Clock;
use crate::inventory::{EventFilter, EventStatus, EventWriter, StoreError};
use crate::metrics::{PASS_DURATION, PASS_FAILURES, STATUS_TRANSITIONS};
use crate::sweeper::PassFailure;

/// Status an event dated `date` should show on `today`.
///
/// `Cancelado` and `Liquidado` are returned unchanged.
pub fn classify(today: NaiveDate, date: NaiveDate, current: EventStatus) -> EventStatus {
    if current.is_sticky() {
        return current;
    }
    if date < today {
        EventStatus::Finalizado
    } else if date == today {
        EventStatus::Hoy
    } else if today.checked_add_days(Days::new(1)) == Some(date) {
        EventStatus::Manana
    } else {
        EventStatus::Proximo
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusTransition {
    pub event_id: String,
    pub from: EventStatus,
    pub to: EventStatus,
}

/// Outcome of one classification pass.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ClassifyReport {
    pub today: Option<NaiveDate>,
    pub events_scanned: usize,
    pub transitions: Vec<StatusTransition>,
    pub failures: Vec<PassFailure>,
}

/// Rewrites the status of every non-sticky event whose computed status
/// differs from the stored one.
pub struct StatusClassifier {
    writer: EventWriter,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    audit: Option<AuditHandle>,
}

impl StatusClassifier {
    /// `offset` defines where the calendar day starts.
    pub fn new(
        writer: EventWriter,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
        audit: Option<AuditHandle>,
    ) -> Self {
        Self {
            writer,
            clock,
            offset,
            audit,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.offset).date_naive()
    }

    /// Time left until the next calendar day starts.
    pub fn until_next_day(&self) -> Duration {
        until_next_day(self.clock.now(), self.offset)
    }

    pub fn classify_once(&self) -> Result<ClassifyReport, StoreError> {
        let started = Instant::now();
        let today = self.today();
        let event_ids = self
            .writer
            .store()
            .list_ids(&EventFilter::all().excluding_sticky())?;

        let mut report = ClassifyReport {
            today: Some(today),
            events_scanned: event_ids.len(),
            ..Default::default()
        };

        for event_id in event_ids {
            match self.classify_event(&event_id, today) {
                Ok(Some((from, to))) => {
                    STATUS_TRANSITIONS.with_label_values(&[to.as_str()]).inc();
                    record(
                        &self.audit,
                        AuditEvent::StatusChanged {
                            event_id: event_id.clone(),
                            from_status: from.to_string(),
                            to_status: to.to_string(),
                            changed_by: None,
                        },
                    );
                    report.transitions.push(StatusTransition { event_id, from, to });
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Classification failed for event {}: {}", event_id, e);
                    PASS_FAILURES.with_label_values(&["classify"]).inc();
                    report.failures.push(PassFailure {
                        event_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        PASS_DURATION
            .with_label_values(&["classify"])
            .observe(started.elapsed().as_secs_f64());
        info!(
            "Classified {} events for {}: {} transitions, {} failures",
            report.events_scanned,
            today,
            report.transitions.len(),
            report.failures.len()
        );

        Ok(report)
    }

    fn classify_event(
        &self,
        event_id: &str,
        today: NaiveDate,
    ) -> Result<Option<(EventStatus, EventStatus)>, StoreError> {
        match self.writer.store().get(event_id)? {
            Some(event) if classify(today, event.date, event.status) != event.status => {}
            _ => return Ok(None),
        }

        let written = self.writer.mutate_if_changed(event_id, |current| {
            let next = classify(today, current.date, current.status);
            if next == current.status {
                return Ok::<_, StoreError>(None);
            }
            let from = current.status;
            current.status = next;
            Ok(Some((from, next)))
        })?;

        Ok(written.map(|(_, transition)| transition))
    }
}

/// Time from `now` until the next midnight at `offset`.
pub fn until_next_day(now: DateTime<Utc>, offset: FixedOffset) -> Duration {
    let local = now.with_timezone(&offset);
    let next_midnight = local
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(offset).single());

    match next_midnight {
        Some(midnight) => (midnight.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
        None => Duration::from_secs(86_400),
    }
}
