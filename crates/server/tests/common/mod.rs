//! In-process test server over file-backed stores and a manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use boletera_core::{
    create_audit_system, testing::ManualClock, ApiKeyAuthenticator, AuditStore, AuthConfig,
    AuthMethod, Authenticator, Clock, Config, DatabaseConfig, EventStore, NoneAuthenticator,
    OrderStore, SqliteAuditStore, SqliteEventStore, SqliteOrderStore,
};
use boletera_server::state::AppState;

pub use boletera_core::testing::fixtures;

pub const STAFF_KEY: &str = "box-office-key";

pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub temp_dir: TempDir,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Require `STAFF_KEY` for staff routes instead of treating everyone as staff.
    pub require_api_key: bool,
}

impl TestConfig {
    pub fn with_api_key() -> Self {
        Self {
            require_api_key: true,
        }
    }
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let (auth, authenticator): (AuthConfig, Arc<dyn Authenticator>) =
            if test_config.require_api_key {
                (
                    AuthConfig {
                        method: AuthMethod::ApiKey,
                        api_key: Some(STAFF_KEY.to_string()),
                    },
                    Arc::new(ApiKeyAuthenticator::new(STAFF_KEY.to_string())),
                )
            } else {
                (
                    AuthConfig {
                        method: AuthMethod::None,
                        api_key: None,
                    },
                    Arc::new(NoneAuthenticator::new()),
                )
            };

        let config = Config {
            auth,
            server: Default::default(),
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            reservation: Default::default(),
            scheduler: Default::default(),
        };

        let audit_store: Arc<dyn AuditStore> =
            Arc::new(SqliteAuditStore::new(&db_path).expect("Failed to create audit store"));
        let event_store: Arc<dyn EventStore> =
            Arc::new(SqliteEventStore::new(&db_path).expect("Failed to create event store"));
        let order_store: Arc<dyn OrderStore> =
            Arc::new(SqliteOrderStore::new(&db_path).expect("Failed to create order store"));

        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let clock = Arc::new(ManualClock::new(fixtures::fixture_instant()));

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            audit_handle,
            audit_store,
            event_store,
            order_store,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));

        let router = boletera_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            clock,
            temp_dir,
        }
    }

    /// Create the two-sector theatre used across the API tests.
    ///
    /// Platea: rows `a` (a1, a2) and `b` (b1, b2), tier `platea` at 4000 cents.
    /// Pullman: row `p` (p1, p2), tier `pullman` at 2500 cents.
    pub async fn create_theatre(&self) -> String {
        let response = self.post("/api/v1/events", theatre_body()).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }

    pub async fn hold(
        &self,
        event_id: &str,
        seat: (&str, &str, &str),
        holder: &str,
    ) -> TestResponse {
        self.post(
            &format!("/api/v1/events/{}/hold-seat", event_id),
            json!({"sectorId": seat.0, "row": seat.1, "seat": seat.2, "holderId": holder}),
        )
        .await
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[]).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body), &[]).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, &[]).await
    }

    /// Send a request with extra headers (credentials).
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

pub fn theatre_body() -> Value {
    json!({
        "name": "La vida es sueño",
        "date": "2030-06-15",
        "venue_id": "teatro-central",
        "tiers": [
            {"id": "platea", "label": "Platea", "price_cents": 4000, "capacity": 4, "sector_id": "platea"},
            {"id": "pullman", "label": "Pullman", "price_cents": 2500, "capacity": 2, "sector_id": "pullman"}
        ],
        "sectors": [
            {"id": "platea", "label": "Platea", "rows": [
                {"id": "a", "label": "A", "seats": [{"id": "a1", "label": "A1"}, {"id": "a2", "label": "A2"}]},
                {"id": "b", "label": "B", "seats": [{"id": "b1", "label": "B1"}, {"id": "b2", "label": "B2"}]}
            ]},
            {"id": "pullman", "label": "Pullman", "rows": [
                {"id": "p", "label": "P", "seats": [{"id": "p1", "label": "P1"}, {"id": "p2", "label": "P2"}]}
            ]}
        ]
    })
}

pub fn checkout_body(event_id: &str, holder: &str, tickets: Value) -> Value {
    json!({
        "event_id": event_id,
        "holder_id": holder,
        "buyer": {"name": "Ana Pérez", "email": "ana@example.com"},
        "payment_method": "card",
        "tickets": tickets
    })
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
