//! Buyer-facing seat holds.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use boletera_core::{HoldReceipt, SeatRef};
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiResult;
use crate::state::AppState;

/// Body of `hold-seat` and `release-seat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatHoldBody {
    pub sector_id: String,
    pub row: String,
    pub seat: String,
    pub holder_id: String,
    /// Ignored by `release-seat`.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl SeatHoldBody {
    fn seat_ref(&self) -> SeatRef {
        SeatRef::new(&self.sector_id, &self.row, &self.seat)
    }
}

pub async fn hold_seat(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(body): Json<SeatHoldBody>,
) -> ApiResult<Json<HoldReceipt>> {
    let receipt = state.ledger().place_hold(
        &event_id,
        &body.seat_ref(),
        &body.holder_id,
        body.ttl_secs,
    )?;
    Ok(Json(receipt))
}

pub async fn release_seat(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(body): Json<SeatHoldBody>,
) -> ApiResult<StatusCode> {
    state
        .ledger()
        .release_hold(&event_id, &body.seat_ref(), &body.holder_id)?;
    Ok(StatusCode::NO_CONTENT)
}
