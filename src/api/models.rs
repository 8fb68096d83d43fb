//! API request and response models

use crate::{
    game::types::{Participant, RoundSnapshot, SessionStatus, UserId},
    stats::UserStats,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChooseNumberRequest {
    pub number: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub participant: Participant,
    pub queued: bool,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentRoundResponse {
    pub round: Option<RoundSnapshot>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopPlayersQuery {
    pub limit: Option<usize>,
}

/// Inclusive bounds on `started_at`, RFC 3339
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoundsQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatsResponse {
    pub user_id: UserId,
    #[serde(flatten)]
    pub stats: UserStats,
}
