//! Checkout and order lookup.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use boletera_core::{CheckoutRequest, Order};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use super::middleware::StaffUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct EventOrdersResponse {
    pub orders: Vec<Order>,
    pub total: usize,
}

/// Convert the caller's holds (or tier stock) into an order.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = state.checkout().commit(&body)?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Order>> {
    state
        .checkout()
        .get_order(&order_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("order not found: {}", order_id)))
}

pub async fn list_event_orders(
    State(state): State<Arc<AppState>>,
    StaffUser(_staff): StaffUser,
    Path(event_id): Path<String>,
) -> ApiResult<Json<EventOrdersResponse>> {
    // 404 for unknown events rather than an empty list.
    state.inventory().get_event(&event_id)?;
    let orders = state.checkout().orders_for_event(&event_id)?;
    Ok(Json(EventOrdersResponse {
        total: orders.len(),
        orders,
    }))
}
