//! Background pass status and manual triggers.

use axum::{extract::State, Json};
use boletera_core::{ClassifyReport, SchedulerStatus, SweepReport};
use std::sync::Arc;
use tracing::info;

use super::error::ApiResult;
use super::middleware::StaffUser;
use crate::state::AppState;

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler().status().await)
}

/// Run one expiry sweep now, whether or not the loops are running.
pub async fn sweep(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
) -> ApiResult<Json<SweepReport>> {
    info!("Manual sweep requested by {}", staff.user_id);
    Ok(Json(state.scheduler().sweep_now().await?))
}

/// Run one status classification now.
pub async fn classify(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
) -> ApiResult<Json<ClassifyReport>> {
    info!("Manual classification requested by {}", staff.user_id);
    Ok(Json(state.scheduler().classify_now().await?))
}
