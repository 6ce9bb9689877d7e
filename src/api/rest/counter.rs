//! Counter endpoints

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::api::state::AppState;
use crate::types::{CounterSnapshot, HistoryAudit};

/// Request body for `POST /counter/increment`
#[derive(Debug, Deserialize)]
pub struct IncrementRequest {
    /// Caller identity
    #[serde(alias = "actor")]
    pub who: String,
}

/// Response body for a successful increment
#[derive(Debug, Serialize)]
pub struct IncrementResponse {
    pub message: String,
    pub value: i64,
}

/// POST /counter/increment - Increment the counter
pub async fn increment(
    State(state): State<Arc<AppState>>,
    input: Result<Json<IncrementRequest>, JsonRejection>,
) -> Result<Json<IncrementResponse>, ApiError> {
    let Json(input) = input.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let outcome = state.store.increment(&input.who).await?;

    Ok(Json(IncrementResponse {
        message: "Counter updated".to_string(),
        value: outcome.new_value,
    }))
}

/// GET /counter - Current value and recent history
pub async fn get_counter(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CounterSnapshot>, ApiError> {
    Ok(Json(state.store.snapshot()?))
}

/// GET /counter/audit - Consistency audit over the full history
pub async fn get_audit(State(state): State<Arc<AppState>>) -> Result<Json<HistoryAudit>, ApiError> {
    Ok(Json(state.store.verify()?))
}
