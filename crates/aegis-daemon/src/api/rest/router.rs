//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::daemon_status))
        // Ingress and consensus
        .route("/signals", post(handlers::push_signal))
        .route("/events/:id", get(handlers::get_event))
        .route("/validators", get(handlers::list_validators))
        // Responses
        .route("/responses", get(handlers::list_responses))
        .route("/responses/:id", get(handlers::get_response))
        .route("/responses/:id/participants", post(handlers::join_response))
        .route("/responses/:id/disbursements", post(handlers::disburse))
        .route("/responses/:id/completion", post(handlers::complete_response))
        .route("/payouts", get(handlers::list_payouts))
        .route("/reputation", get(handlers::reputation_leaderboard))
        // Lifecycle
        .route("/lifecycle/stream", get(handlers::stream_lifecycle));

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
