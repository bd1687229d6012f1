//! Gate validation: marks a ticket used, once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::{record, AuditEvent, AuditHandle};
use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::metrics::TICKETS_VALIDATED;
use crate::orders::{normalize_verifier_code, OrderError, OrderStore, Ticket};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    #[error("ticket {code} is for event {actual}, not {expected}")]
    EventMismatch {
        code: String,
        expected: String,
        actual: String,
    },

    #[error("ticket {code} already used at {used_at}")]
    AlreadyUsed {
        code: String,
        used_at: DateTime<Utc>,
    },

    #[error(transparent)]
    Store(OrderError),
}

impl From<OrderError> for GateError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::TicketNotFound(code) => GateError::TicketNotFound(code),
            OrderError::EventMismatch {
                code,
                expected,
                actual,
            } => GateError::EventMismatch {
                code,
                expected,
                actual,
            },
            OrderError::AlreadyUsed { code, used_at } => GateError::AlreadyUsed { code, used_at },
            other => GateError::Store(other),
        }
    }
}

impl GateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::TicketNotFound(_) => ErrorKind::NotFound,
            GateError::EventMismatch { .. } => ErrorKind::Invalid,
            GateError::AlreadyUsed { .. } => ErrorKind::Conflict,
            GateError::Store(e) => e.kind(),
        }
    }

    /// Metric label.
    pub fn result(&self) -> &'static str {
        match self {
            GateError::TicketNotFound(_) => "not_found",
            GateError::EventMismatch { .. } => "event_mismatch",
            GateError::AlreadyUsed { .. } => "already_used",
            GateError::Store(_) => "error",
        }
    }
}

/// A ticket that was just let in.
#[derive(Debug, Clone, Serialize)]
pub struct AdmittedTicket {
    pub order_id: String,
    pub event_id: String,
    pub ticket: Ticket,
}

pub struct GateService {
    orders: Arc<dyn OrderStore>,
    clock: Arc<dyn Clock>,
    audit: Option<AuditHandle>,
}

impl GateService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        clock: Arc<dyn Clock>,
        audit: Option<AuditHandle>,
    ) -> Self {
        Self {
            orders,
            clock,
            audit,
        }
    }

    /// Flip `used` on the ticket with this code. Every other ticket of the
    /// order is left as it was.
    pub fn mark_used(
        &self,
        verifier_code: &str,
        event_id: &str,
        actor: &str,
    ) -> Result<AdmittedTicket, GateError> {
        let code = normalize_verifier_code(verifier_code);
        let outcome = self
            .orders
            .mark_ticket_used(&code, event_id, self.clock.now())
            .map_err(GateError::from);

        let order = match outcome {
            Ok(order) => order,
            Err(e) => {
                TICKETS_VALIDATED.with_label_values(&[e.result()]).inc();
                warn!("Gate rejected ticket {} for event {}: {}", code, event_id, e);
                return Err(e);
            }
        };

        let ticket = order
            .ticket_by_code(&code)
            .cloned()
            .ok_or_else(|| GateError::TicketNotFound(code.clone()))?;

        TICKETS_VALIDATED.with_label_values(&["ok"]).inc();
        info!("Ticket {} of order {} admitted by {}", code, order.id, actor);
        record(
            &self.audit,
            AuditEvent::TicketUsed {
                event_id: event_id.to_string(),
                order_id: order.id.clone(),
                verifier_code: code,
                validated_by: actor.to_string(),
            },
        );

        Ok(AdmittedTicket {
            order_id: order.id,
            event_id: event_id.to_string(),
            ticket,
        })
    }
}
