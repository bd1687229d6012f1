//! Mapping from domain errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use boletera_core::{
    CheckoutError, ErrorKind, GateError, InventoryError, LedgerError, OrderError,
    SchedulerError,
};
use serde::Serialize;
use tracing::error;

/// Error body returned by every handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn forbidden() -> Self {
        Self::new(ErrorKind::Unauthorized, "staff permission required")
    }

    pub fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::Invalid => StatusCode::BAD_REQUEST,
            ErrorKind::Transient => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Storage failures are logged in full and reported generically.
        let message = if self.kind == ErrorKind::Transient {
            error!("Request failed: {}", self.message);
            "temporary failure, please retry".to_string()
        } else {
            self.message
        };
        let body = ErrorResponse {
            error: message,
            kind: self.kind.as_str(),
        };
        (status, Json(body)).into_response()
    }
}

macro_rules! from_domain_error {
    ($($error:ty),*) => {
        $(
            impl From<$error> for ApiError {
                fn from(e: $error) -> Self {
                    ApiError::new(e.kind(), e.to_string())
                }
            }
        )*
    };
}

from_domain_error!(InventoryError, LedgerError, CheckoutError, GateError, OrderError);

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        ApiError::new(ErrorKind::Transient, e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use boletera_core::SeatRef;

    #[test]
    fn test_status_per_kind() {
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::invalid("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::forbidden().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(CheckoutError::SoldOut("platea".to_string())).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_not_held_by_caller_is_forbidden() {
        let seat = SeatRef::new("sec-a", "row-1", "s1-1");
        let err = ApiError::from(LedgerError::NotHeldByCaller(seat));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
