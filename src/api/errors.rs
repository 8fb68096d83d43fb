//! API Error Handling
//!
//! Structured error responses with HTTP status codes and request tracking.

use crate::errors::{GameError, StoreError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code (ROUND_ENDED, BAD_REQUEST, ...)
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    Game(GameError),
    BadRequest(String),
    Unauthorized(String),
}

impl ApiError {
    pub fn game(request_id: String, error: GameError) -> Self {
        Self {
            kind: ApiErrorKind::Game(error),
            request_id,
        }
    }

    pub fn store(request_id: String, error: StoreError) -> Self {
        Self::game(request_id, GameError::Store(error))
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    pub fn unauthorized(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized(message),
            request_id,
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.kind {
            ApiErrorKind::Game(e) => game_status(e),
            ApiErrorKind::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiErrorKind::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match &self.kind {
            ApiErrorKind::Game(e) => e.code(),
            ApiErrorKind::BadRequest(_) => "BAD_REQUEST",
            ApiErrorKind::Unauthorized(_) => "UNAUTHORIZED",
        }
    }
}

fn game_status(error: &GameError) -> StatusCode {
    match error {
        GameError::InvalidNumber(_) | GameError::RoundEnded | GameError::NoActiveSession => {
            StatusCode::BAD_REQUEST
        }
        GameError::ForbiddenWhileQueued => StatusCode::FORBIDDEN,
        GameError::AlreadyJoined
        | GameError::AlreadyCompleted(_)
        | GameError::AlreadyOpen(_)
        | GameError::ConflictCreatingRound => StatusCode::CONFLICT,
        GameError::RoundNotFound(_) => StatusCode::NOT_FOUND,
        GameError::Store(StoreError::Timeout(_)) => StatusCode::SERVICE_UNAVAILABLE,
        GameError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::Game(e) => write!(f, "[{}] {}: {}", self.request_id, e.code(), e),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
            ApiErrorKind::Unauthorized(msg) => write!(f, "[{}] Unauthorized: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.kind {
            // Store internals stay in the logs
            ApiErrorKind::Game(GameError::Store(StoreError::Timeout(_))) => {
                "Record store timed out".to_string()
            }
            ApiErrorKind::Game(GameError::Store(_)) => "Record store failure".to_string(),
            ApiErrorKind::Game(e) => e.to_string(),
            ApiErrorKind::BadRequest(msg) | ApiErrorKind::Unauthorized(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: self.code().to_string(),
                message,
                details: None,
            },
        });

        (status, body).into_response()
    }
}
