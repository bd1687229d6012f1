use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::AuditEvent;

/// Envelope wrapping an audit event with metadata
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

/// Handle for emitting audit events
///
/// Cheap to clone. Events go through a bounded channel to the AuditWriter;
/// a full or closed channel is logged and never fails the caller.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
}

impl AuditHandle {
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx }
    }

    fn envelope(event: AuditEvent) -> AuditEventEnvelope {
        AuditEventEnvelope {
            timestamp: Utc::now(),
            event,
        }
    }

    /// Emit an audit event, waiting for channel capacity.
    pub async fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.tx.send(Self::envelope(event)).await {
            tracing::error!("Failed to emit audit event: {}", e);
        }
    }

    /// Emit without blocking. Used from the synchronous write paths, which
    /// run while an event lock is held.
    ///
    /// Returns true if the event was queued.
    pub fn try_emit(&self, event: AuditEvent) -> bool {
        match self.tx.try_send(Self::envelope(event)) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit audit event: {}", e);
                false
            }
        }
    }
}

/// Emit through an optional handle.
pub(crate) fn record(audit: &Option<AuditHandle>, event: AuditEvent) {
    if let Some(audit) = audit {
        audit.try_emit(event);
    }
}
