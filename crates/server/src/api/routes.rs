use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{auth_middleware, metrics_middleware};
use super::{audit, events, handlers, orders, reservations, scheduler, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Audit
        .route("/audit", get(audit::query_audit))
        // Events
        .route("/events", post(events::create_event).get(events::list_events))
        .route("/events/{id}", get(events::get_event))
        .route("/events/{id}/status", put(events::set_status))
        .route("/events/{id}/tiers", post(events::add_tier))
        .route(
            "/events/{id}/tiers/{tier_id}/capacity",
            put(events::set_tier_capacity),
        )
        .route(
            "/events/{id}/tiers/{tier_id}/remaining",
            get(events::tier_remaining),
        )
        // Seat map
        .route("/events/{id}/sectors", get(events::get_sectors))
        .route("/events/{id}/sectors/{sector_id}", delete(events::delete_sector))
        .route(
            "/events/{id}/sectors/{sector_id}/toggle-available",
            put(events::toggle_sector),
        )
        .route(
            "/events/{id}/sectors/{sector_id}/rows/{row_id}",
            delete(events::delete_row),
        )
        .route(
            "/events/{id}/sectors/{sector_id}/rows/{row_id}/toggle-available",
            put(events::toggle_row),
        )
        .route(
            "/events/{id}/sectors/{sector_id}/rows/{row_id}/seats/{seat_id}",
            get(events::seat_state),
        )
        .route(
            "/events/{id}/sectors/{sector_id}/rows/{row_id}/seats/{seat_id}/toggle-available",
            put(events::toggle_seat),
        )
        // Holds
        .route("/events/{id}/hold-seat", post(reservations::hold_seat))
        .route("/events/{id}/release-seat", post(reservations::release_seat))
        // Orders
        .route("/orders", post(orders::create_order))
        .route("/orders/{id}", get(orders::get_order))
        .route("/events/{id}/orders", get(orders::list_event_orders))
        // Gate
        .route("/tickets/mark-used/{code}", put(tickets::mark_used))
        // Scheduler
        .route("/scheduler/status", get(scheduler::get_status))
        .route("/scheduler/sweep", post(scheduler::sweep))
        .route("/scheduler/classify", post(scheduler::classify))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
