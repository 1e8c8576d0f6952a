//! Push ingress for signals that do not come from a polled source

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use aegis_consensus::Admission;
use aegis_types::{EventId, GeoPoint, RawSignal, SignalKind};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pushed signal body
#[derive(Debug, Deserialize)]
pub struct PushSignalRequest {
    pub kind: SignalKind,
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: f64,
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_source_confidence")]
    pub source_confidence: f64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_source() -> String {
    "push".to_string()
}

fn default_source_confidence() -> f64 {
    0.5
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PushSignalResponse {
    pub event_id: EventId,
    pub admission: Admission,
}

/// Accept a signal; consensus runs in the background
pub async fn push_signal(
    State(state): State<AppState>,
    Json(request): Json<PushSignalRequest>,
) -> ApiResult<(StatusCode, Json<PushSignalResponse>)> {
    let location = GeoPoint::new(request.latitude, request.longitude);
    let observed_at = request.observed_at.unwrap_or_else(Utc::now);
    let event_id = state
        .pipeline
        .dedup()
        .event_id(request.kind, &location, observed_at);

    let signal = RawSignal::new(
        event_id.clone(),
        request.kind,
        location,
        request.magnitude,
        observed_at,
        request.source,
    )
    .with_source_confidence(request.source_confidence)
    .with_metadata(request.metadata);

    let admission = state.pipeline.ingest(signal)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PushSignalResponse {
            event_id,
            admission,
        }),
    ))
}
