//! Door validation.

use axum::{
    extract::{Path, State},
    Json,
};
use boletera_core::AdmittedTicket;
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiResult;
use super::middleware::StaffUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkUsedBody {
    pub event_id: String,
}

pub async fn mark_used(
    State(state): State<Arc<AppState>>,
    StaffUser(staff): StaffUser,
    Path(verifier_code): Path<String>,
    Json(body): Json<MarkUsedBody>,
) -> ApiResult<Json<AdmittedTicket>> {
    let admitted = state
        .gate()
        .mark_used(&verifier_code, &body.event_id, &staff.user_id)?;
    Ok(Json(admitted))
}
