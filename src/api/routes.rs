//! Route Definitions

use super::{handlers::*, websocket::websocket_handler};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Round lifecycle
        .route("/game/current", get(current_round_handler))
        .route("/game/status", get(status_handler))
        .route("/game/join", post(join_handler))
        .route("/game/leave", post(leave_handler))
        .route("/game/choose", post(choose_handler))
        .route("/game/rounds/:id/complete", post(complete_round_handler))
        // Leaderboard
        .route("/leaderboard/top", get(top_players_handler))
        .route("/leaderboard/rounds", get(rounds_by_date_handler))
        .route("/leaderboard/period/:period", get(period_winners_handler))
        .route("/leaderboard/users/:user_id", get(user_stats_handler))
        .route("/ws", get(websocket_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
