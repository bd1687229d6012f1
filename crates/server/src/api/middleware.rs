//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use boletera_core::{require_staff, AuthError, AuthRequest, Identity};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::error::ApiError;
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Resolves the caller's [`Identity`] and stores it in the request extensions.
///
/// Requests without credentials continue as [`Identity::public`]: buyers
/// browse, hold and check out without an account. Wrong credentials are
/// rejected with 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    // Get source IP (default to localhost if not available)
    let source_ip = request
        .extensions()
        .get::<std::net::SocketAddr>()
        .map(|addr| addr.ip())
        .unwrap_or_else(|| std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));

    let auth_request = AuthRequest { headers, source_ip };

    let identity = match state.authenticator().resolve(&auth_request).await {
        Ok(identity) => identity,
        Err(e @ AuthError::InvalidCredentials(_)) => {
            debug!("Rejected credentials: {}", e);
            AUTH_FAILURES_TOTAL.with_label_values(&[e.reason()]).inc();
            return Err(StatusCode::UNAUTHORIZED);
        }
        Err(e) => {
            warn!("Authenticator failed: {}", e);
            AUTH_FAILURES_TOTAL.with_label_values(&[e.reason()]).inc();
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mut request = request;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn identity_of(parts: &Parts) -> Identity {
    parts
        .extensions
        .get::<Identity>()
        .cloned()
        .unwrap_or_else(Identity::public)
}

/// Extractor for the caller's user ID.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        std::future::ready(Ok(AuthUser(identity_of(parts).user_id)))
    }
}

/// Extractor that only admits staff identities; everyone else gets 403.
#[derive(Debug, Clone)]
pub struct StaffUser(pub Identity);

impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let identity = identity_of(parts);
        let outcome = match require_staff(&identity) {
            Ok(()) => Ok(StaffUser(identity)),
            Err(e) => {
                AUTH_FAILURES_TOTAL.with_label_values(&[e.reason()]).inc();
                Err(ApiError::forbidden())
            }
        };
        std::future::ready(outcome)
    }
}
