//! Consensus state of individual events

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use aegis_consensus::EventSnapshot;
use aegis_types::EventId;
use axum::{
    extract::{Path, State},
    Json,
};

/// Scores, corroborating sources and decision for one event
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EventSnapshot>> {
    state
        .pipeline
        .aggregator()
        .event(&EventId::new(id.clone()))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Event {}", id)))
}
