pub mod audit;
pub mod error;
pub mod events;
pub mod handlers;
pub mod middleware;
pub mod orders;
pub mod reservations;
pub mod routes;
pub mod scheduler;
pub mod tickets;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
