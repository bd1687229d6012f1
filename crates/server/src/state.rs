use std::sync::Arc;

use boletera_core::{
    AuditHandle, AuditStore, Authenticator, CheckoutService, Clock, Config, EventStore,
    EventWriter, ExpirySweeper, GateService, InventoryService, OrderStore, ReservationLedger,
    SanitizedConfig, Scheduler, StatusClassifier,
};
use chrono::{Offset, Utc};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    audit_store: Arc<dyn AuditStore>,
    clock: Arc<dyn Clock>,
    inventory: InventoryService,
    ledger: ReservationLedger,
    checkout: CheckoutService,
    gate: GateService,
    scheduler: Arc<Scheduler>,
}

impl AppState {
    /// Wire every service over the given stores.
    ///
    /// All services share one [`EventWriter`], so they serialize on the same
    /// per-event locks. The scheduler is built but not started.
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        audit_handle: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
        event_store: Arc<dyn EventStore>,
        order_store: Arc<dyn OrderStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let writer =
            EventWriter::new(event_store).with_max_retries(config.reservation.max_write_retries);
        let audit = Some(audit_handle);

        let offset = config.scheduler.offset().unwrap_or_else(|| Utc.fix());
        let inventory = InventoryService::new(writer.clone(), Arc::clone(&clock), audit.clone())
            .with_offset(offset);
        let ledger = ReservationLedger::new(
            writer.clone(),
            Arc::clone(&clock),
            config.reservation.ledger(),
            audit.clone(),
        );
        let checkout = CheckoutService::new(
            writer.clone(),
            Arc::clone(&order_store),
            Arc::clone(&clock),
            audit.clone(),
        );
        let gate = GateService::new(order_store, Arc::clone(&clock), audit.clone());

        let sweeper = ExpirySweeper::new(writer.clone(), Arc::clone(&clock), audit.clone());
        let classifier = StatusClassifier::new(writer, Arc::clone(&clock), offset, audit);
        let scheduler = Scheduler::new(
            config.scheduler.clone(),
            Arc::new(sweeper),
            Arc::new(classifier),
            Arc::clone(&clock),
        );

        Self {
            config,
            authenticator,
            audit_store,
            clock,
            inventory,
            ledger,
            checkout,
            gate,
            scheduler: Arc::new(scheduler),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn audit_store(&self) -> &Arc<dyn AuditStore> {
        &self.audit_store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn inventory(&self) -> &InventoryService {
        &self.inventory
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.ledger
    }

    pub fn checkout(&self) -> &CheckoutService {
        &self.checkout
    }

    pub fn gate(&self) -> &GateService {
        &self.gate
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }
}
