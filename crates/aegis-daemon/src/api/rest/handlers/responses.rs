//! Response records, participants, disbursements and completion

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use aegis_dispatch::{Archival, CompletionReport, ReputationEntry};
use aegis_types::{
    AlertLevel, Amount, EventId, Participant, ParticipantId, ParticipantRole, PayoutRecord,
    ResponseId, ResponseRecord, ResponseStatus, SignalKind,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

/// List responses query params
#[derive(Debug, Deserialize)]
pub struct ListResponsesQuery {
    pub status: Option<ResponseStatus>,
}

/// Summary view of a response
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseSummary {
    pub response_id: ResponseId,
    pub event_id: EventId,
    pub kind: SignalKind,
    pub severity: AlertLevel,
    pub status: ResponseStatus,
    pub treasury_balance: Amount,
    pub total_funding: Amount,
    pub participant_count: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ResponseRecord> for ResponseSummary {
    fn from(record: ResponseRecord) -> Self {
        Self {
            participant_count: record.participants.len(),
            response_id: record.response_id,
            event_id: record.event_id,
            kind: record.kind,
            severity: record.severity,
            status: record.status,
            treasury_balance: record.treasury_balance,
            total_funding: record.total_funding,
            created_at: record.created_at,
        }
    }
}

/// List responses, newest first
pub async fn list_responses(
    State(state): State<AppState>,
    Query(query): Query<ListResponsesQuery>,
) -> Json<Vec<ResponseSummary>> {
    let responses = state
        .pipeline
        .dispatcher()
        .registry()
        .list()
        .into_iter()
        .filter(|r| query.status.map_or(true, |s| r.status == s))
        .map(ResponseSummary::from)
        .collect();

    Json(responses)
}

/// Get a full response record
pub async fn get_response(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ResponseRecord>> {
    state
        .pipeline
        .dispatcher()
        .registry()
        .get(&ResponseId::new(id.clone()))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Response {}", id)))
}

/// Join request
#[derive(Debug, Deserialize)]
pub struct JoinResponseRequest {
    pub participant_id: String,
    pub role: ParticipantRole,
    /// Optional donation into the response treasury
    #[serde(default)]
    pub contribution: u64,
}

/// Add a participant to a response
pub async fn join_response(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<JoinResponseRequest>,
) -> ApiResult<(StatusCode, Json<Participant>)> {
    if request.participant_id.trim().is_empty() {
        return Err(ApiError::BadRequest("participant_id is required".to_string()));
    }

    let participant = state.pipeline.dispatcher().registry().join(
        &ResponseId::new(id),
        ParticipantId::new(request.participant_id),
        request.role,
        Amount::new(request.contribution),
    )?;

    Ok((StatusCode::CREATED, Json(participant)))
}

/// Disbursement request
#[derive(Debug, Deserialize)]
pub struct DisburseRequest {
    pub participant_id: String,
    pub amount: u64,
}

/// Pay a participant from the response treasury
pub async fn disburse(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DisburseRequest>,
) -> ApiResult<Json<ResponseRecord>> {
    let record = state.pipeline.dispatcher().registry().disburse(
        &ResponseId::new(id),
        &ParticipantId::new(request.participant_id),
        Amount::new(request.amount),
    )?;

    Ok(Json(record))
}

/// Archive a response and award recognition
pub async fn complete_response(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(report): Json<CompletionReport>,
) -> ApiResult<Json<Archival>> {
    let archival = state
        .pipeline
        .dispatcher()
        .registry()
        .complete(&ResponseId::new(id), &report)?;

    Ok(Json(archival))
}

/// Parametric payout history
pub async fn list_payouts(State(state): State<AppState>) -> Json<Vec<PayoutRecord>> {
    Json(state.pipeline.dispatcher().vault().payouts())
}

/// Participants ranked by accumulated reputation
pub async fn reputation_leaderboard(State(state): State<AppState>) -> Json<Vec<ReputationEntry>> {
    Json(
        state
            .pipeline
            .dispatcher()
            .registry()
            .recognition()
            .leaderboard(),
    )
}
