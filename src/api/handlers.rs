//! Request Handlers
//!
//! Thin adapters from HTTP to the coordinator and the stats reporter. Every
//! handler echoes the request id into its error body.

use super::{
    errors::ApiError,
    middleware::{CurrentUser, RequestId},
    models::*,
};
use crate::{
    game::{
        coordinator::RoundCoordinator,
        types::{
            LeaveOutcome, Participant, RoundId, RoundOutcome, RoundSnapshot, SessionStatus, UserId,
        },
    },
    metrics::GameMetrics,
    stats::{Period, PeriodWinner, PlayerStanding, StatsReporter, DEFAULT_TOP_LIMIT},
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub coordinator: Arc<RoundCoordinator>,
    pub stats: StatsReporter,
    pub metrics: Arc<GameMetrics>,
    pub version: String,
}

impl AppState {
    pub fn new(coordinator: Arc<RoundCoordinator>, stats: StatsReporter) -> Self {
        Self {
            metrics: coordinator.metrics(),
            coordinator,
            stats,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
    })
}

/// GET /game/current
pub async fn current_round_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<CurrentRoundResponse>, ApiError> {
    let round = state
        .coordinator
        .get_current_round()
        .await
        .map_err(|e| ApiError::game(request_id.0.clone(), e))?;
    let status = state
        .coordinator
        .get_status()
        .await
        .map_err(|e| ApiError::game(request_id.0.clone(), e))?;
    Ok(Json(CurrentRoundResponse { round, status }))
}

/// GET /game/status
pub async fn status_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionStatus>, ApiError> {
    state
        .coordinator
        .get_status()
        .await
        .map(Json)
        .map_err(|e| ApiError::game(request_id.0, e))
}

/// POST /game/join
pub async fn join_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<JoinResponse>, ApiError> {
    let participant = state
        .coordinator
        .join_round(user_id)
        .await
        .map_err(|e| ApiError::game(request_id.0.clone(), e))?;
    let status = state
        .coordinator
        .get_status()
        .await
        .map_err(|e| ApiError::game(request_id.0.clone(), e))?;

    Ok(Json(JoinResponse {
        queued: participant.in_queue,
        participant,
        status,
    }))
}

/// POST /game/leave
pub async fn leave_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<LeaveResponse>, ApiError> {
    let LeaveOutcome { promoted, .. } = state
        .coordinator
        .leave_round(user_id)
        .await
        .map_err(|e| ApiError::game(request_id.0, e))?;

    Ok(Json(LeaveResponse {
        message: "Left session successfully".to_string(),
        promoted: promoted.map(|p| p.user_id),
    }))
}

/// POST /game/choose
pub async fn choose_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    body: Result<Json<ChooseNumberRequest>, JsonRejection>,
) -> Result<Json<Participant>, ApiError> {
    // Malformed bodies answer in the same error shape as game rejections
    let Json(body) = body.map_err(|rejection| {
        ApiError::bad_request(
            request_id.0.clone(),
            format!("number must be an integer from 1 to 9: {}", rejection.body_text()),
        )
    })?;

    state
        .coordinator
        .choose_number(user_id, body.number)
        .await
        .map(Json)
        .map_err(|e| ApiError::game(request_id.0, e))
}

/// POST /game/rounds/:id/complete
pub async fn complete_round_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(round_id): Path<String>,
) -> Result<Json<RoundOutcome>, ApiError> {
    let round_id: RoundId = round_id.parse().map_err(|_| {
        ApiError::bad_request(request_id.0.clone(), format!("invalid round id: {}", round_id))
    })?;

    state
        .coordinator
        .complete_round(round_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::game(request_id.0, e))
}

/// GET /leaderboard/top?limit=
pub async fn top_players_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopPlayersQuery>,
) -> Result<Json<Vec<PlayerStanding>>, ApiError> {
    state
        .stats
        .top_players(query.limit.unwrap_or(DEFAULT_TOP_LIMIT))
        .await
        .map(Json)
        .map_err(|e| ApiError::store(request_id.0, e))
}

/// GET /leaderboard/rounds?start=&end=
pub async fn rounds_by_date_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoundsQuery>,
) -> Result<Json<Vec<RoundSnapshot>>, ApiError> {
    state
        .stats
        .rounds_by_date(query.start, query.end)
        .await
        .map(Json)
        .map_err(|e| ApiError::store(request_id.0, e))
}

/// GET /leaderboard/period/:period
pub async fn period_winners_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(period): Path<String>,
) -> Result<Json<Vec<PeriodWinner>>, ApiError> {
    let period: Period = period
        .parse()
        .map_err(|e| ApiError::bad_request(request_id.0.clone(), format!("{}", e)))?;

    let now = state.coordinator.clock().now();
    state
        .stats
        .top_winners_by_period(period, now)
        .await
        .map(Json)
        .map_err(|e| ApiError::store(request_id.0, e))
}

/// GET /leaderboard/users/:user_id
pub async fn user_stats_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserStatsResponse>, ApiError> {
    let user_id = UserId::from(user_id);
    let stats = state
        .stats
        .user_stats(&user_id)
        .await
        .map_err(|e| ApiError::store(request_id.0, e))?;
    Ok(Json(UserStatsResponse { user_id, stats }))
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.to_prometheus_format(),
    )
        .into_response()
}

