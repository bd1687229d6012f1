//! Failure taxonomy shared by every write path.

use serde::Serialize;

/// How a failed operation should be treated by its caller.
///
/// None of these are retried automatically; the caller either re-chooses
/// (`Conflict`), fixes the request (`Invalid`), or retries the whole
/// operation later (`Transient`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Event, sector, row, seat, tier, order or ticket does not exist.
    NotFound,
    /// Already reserved, occupied, sold out, used, or lost a write race.
    Conflict,
    /// Caller does not hold the seat or lacks staff permission.
    Unauthorized,
    /// Request is malformed or violates a model invariant.
    Invalid,
    /// Storage failure.
    Transient,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Transient => "transient",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
