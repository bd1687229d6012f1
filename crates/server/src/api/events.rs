//! Event browsing and staff inventory administration.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use boletera_core::{
    Event, EventFilter, EventStatus, NewEvent, NewTier, PriceTier, SeatRef, SeatState, Sector,
    ToggleOutcome, ToggleScope,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use super::middleware::StaffUser;
use crate::state::AppState;

/// Maximum allowed limit for event listings
const MAX_LIMIT: i64 = 1000;

/// Default limit for event listings
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListEventsParams {
    /// Filter by status wire name (`proximo`, `mañana`, ...)
    pub status: Option<String>,
    pub seller_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListEventsResponse {
    pub events: Vec<Event>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusBody {
    pub status: EventStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetCapacityBody {
    pub capacity: u32,
}

#[derive(Debug, Serialize)]
pub struct TierRemainingResponse {
    pub tier_id: String,
    pub remaining: u32,
}

#[derive(Debug, Serialize)]
pub struct SeatStateResponse {
    pub seat: SeatRef,
    #[serde(flatten)]
    pub state: SeatState,
}

// ============================================================================
// Browsing
// ============================================================================

pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListEventsParams>,
) -> ApiResult<Json<ListEventsResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = EventFilter::new().with_limit(limit).with_offset(offset);
    if let Some(status) = params.status.as_deref() {
        let status = EventStatus::parse(status)
            .ok_or_else(|| ApiError::invalid(format!("unknown status: {}", status)))?;
        filter = filter.with_status(status);
    }
    if let Some(seller_id) = params.seller_id {
        filter = filter.with_seller_id(seller_id);
    }

    let (events, total) = state.inventory().list_events(&filter)?;
    Ok(Json(ListEventsResponse {
        events,
        total,
        limit,
        offset,
    }))
}

pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Event>> {
    Ok(Json(state.inventory().get_event(&event_id)?))
}

pub async fn get_sectors(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Vec<Sector>>> {
    Ok(Json(state.inventory().sectors(&event_id)?))
}

pub async fn tier_remaining(
    State(state): State<Arc<AppState>>,
    Path((event_id, tier_id)): Path<(String, String)>,
) -> ApiResult<Json<TierRemainingResponse>> {
    let remaining = state.inventory().tier_remaining(&event_id, &tier_id)?;
    Ok(Json(TierRemainingResponse { tier_id, remaining }))
}

pub async fn seat_state(
    State(state): State<Arc<AppState>>,
    Path((event_id, sector_id, row_id, seat_id)): Path<(String, String, String, String)>,
) -> ApiResult<Json<SeatStateResponse>> {
    let seat = SeatRef::new(sector_id, row_id, seat_id);
    let seat_state = state.inventory().seat_state(&event_id, &seat)?;
    Ok(Json(SeatStateResponse {
        seat,
        state: seat_state,
    }))
}

// ============================================================================
// Administration (staff)
// ============================================================================

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Json(body): Json<NewEvent>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let event = state.inventory().create_event(body, &staff.user_id)?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(event_id): Path<String>,
    Json(body): Json<SetStatusBody>,
) -> ApiResult<Json<Event>> {
    let event = state
        .inventory()
        .set_status(&event_id, body.status, &staff.user_id)?;
    Ok(Json(event))
}

pub async fn add_tier(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(event_id): Path<String>,
    Json(body): Json<NewTier>,
) -> ApiResult<(StatusCode, Json<PriceTier>)> {
    let tier = state.inventory().add_tier(&event_id, body, &staff.user_id)?;
    Ok((StatusCode::CREATED, Json(tier)))
}

pub async fn set_tier_capacity(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path((event_id, tier_id)): Path<(String, String)>,
    Json(body): Json<SetCapacityBody>,
) -> ApiResult<Json<PriceTier>> {
    let tier = state.inventory().set_tier_capacity(
        &event_id,
        &tier_id,
        body.capacity,
        &staff.user_id,
    )?;
    Ok(Json(tier))
}

fn toggle(
    state: &AppState,
    event_id: &str,
    scope: ToggleScope,
    actor: &str,
) -> ApiResult<Json<ToggleOutcome>> {
    Ok(Json(state.ledger().toggle_availability(event_id, &scope, actor)?))
}

pub async fn toggle_sector(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path((event_id, sector_id)): Path<(String, String)>,
) -> ApiResult<Json<ToggleOutcome>> {
    toggle(&state, &event_id, ToggleScope::Sector { sector_id }, &staff.user_id)
}

pub async fn toggle_row(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path((event_id, sector_id, row_id)): Path<(String, String, String)>,
) -> ApiResult<Json<ToggleOutcome>> {
    toggle(
        &state,
        &event_id,
        ToggleScope::Row { sector_id, row_id },
        &staff.user_id,
    )
}

pub async fn toggle_seat(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path((event_id, sector_id, row_id, seat_id)): Path<(String, String, String, String)>,
) -> ApiResult<Json<ToggleOutcome>> {
    let seat = SeatRef::new(sector_id, row_id, seat_id);
    toggle(&state, &event_id, ToggleScope::Seat { seat }, &staff.user_id)
}

pub async fn delete_sector(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path((event_id, sector_id)): Path<(String, String)>,
) -> ApiResult<Json<Event>> {
    let event = state
        .inventory()
        .delete_sector(&event_id, &sector_id, &staff.user_id)?;
    Ok(Json(event))
}

pub async fn delete_row(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path((event_id, sector_id, row_id)): Path<(String, String, String)>,
) -> ApiResult<Json<Event>> {
    let event = state
        .inventory()
        .delete_row(&event_id, &sector_id, &row_id, &staff.user_id)?;
    Ok(Json(event))
}
