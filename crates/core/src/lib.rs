pub mod audit;
pub mod auth;
pub mod checkout;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod inventory;
pub mod ledger;
pub mod metrics;
pub mod orders;
pub mod scheduler;
pub mod sweeper;
pub mod testing;

pub use audit::{
    create_audit_system, AuditCategory, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, SqliteAuditStore,
};
pub use auth::{
    create_authenticator, require_staff, ApiKeyAuthenticator, AuthError, AuthRequest,
    Authenticator, Identity, NoneAuthenticator, Role,
};
pub use checkout::{CheckoutError, CheckoutRequest, CheckoutService, TicketRequest};
pub use classifier::{classify, ClassifyReport, StatusClassifier, StatusTransition};
pub use clock::{Clock, SystemClock};
pub use config::{
    config_path, load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod,
    Config, ConfigError, DatabaseConfig, ReservationConfig, SanitizedConfig, ServerConfig,
};
pub use error::ErrorKind;
pub use gate::{AdmittedTicket, GateError, GateService};
pub use inventory::{
    Event, EventFilter, EventLocks, EventStatus, EventStore, EventWriter, InventoryError,
    InventoryService, NewEvent, NewRow, NewSeat, NewSector, NewTier, PriceTier, Row, Seat,
    SeatRef, SeatState, Sector, SqliteEventStore, StoreError,
};
pub use ledger::{
    HoldReceipt, LedgerConfig, LedgerError, ReservationLedger, ToggleOutcome, ToggleScope,
};
pub use orders::{
    BuyerContact, Order, OrderError, OrderStatus, OrderStore, SqliteOrderStore, Ticket,
};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerError, SchedulerStatus};
pub use sweeper::{ExpirySweeper, PassFailure, SweepReport};
