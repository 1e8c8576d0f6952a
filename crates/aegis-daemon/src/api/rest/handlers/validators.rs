use crate::api::rest::state::AppState;
use aegis_consensus::StakeAccount;
use axum::{extract::State, Json};

/// Validator balances, locked stake and reputation
pub async fn list_validators(State(state): State<AppState>) -> Json<Vec<StakeAccount>> {
    Json(state.pipeline.ledger().accounts())
}
