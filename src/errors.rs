//! Error types for the Lucky Nine game service
//!
//! Domain errors raised by the round coordinator are kept apart from store
//! (infrastructure) failures so callers can tell a rejected move from an
//! outage.

use crate::game::types::RoundId;

/// Rejections raised by the round coordinator
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Join attempted after the round deadline
    #[error("Round has ended")]
    RoundEnded,

    /// The user already holds a seat or queue slot in the open round
    #[error("User already joined the current round")]
    AlreadyJoined,

    /// Leave/choose without a participant in the open round
    #[error("No active session found")]
    NoActiveSession,

    #[error("Cannot choose number while in queue")]
    ForbiddenWhileQueued,

    #[error("Number must be between 1 and 9, got {0}")]
    InvalidNumber(i64),

    #[error("Round {0} is already completed")]
    AlreadyCompleted(RoundId),

    #[error("Round {0} is already open")]
    AlreadyOpen(RoundId),

    #[error("Round {0} not found")]
    RoundNotFound(RoundId),

    /// Lost the race to create a round and the winner's round was gone on re-read
    #[error("Conflict while creating round")]
    ConflictCreatingRound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GameError {
    /// Stable machine-readable code, shared by the HTTP layer and metrics
    pub fn code(&self) -> &'static str {
        match self {
            GameError::RoundEnded => "ROUND_ENDED",
            GameError::AlreadyJoined => "ALREADY_JOINED",
            GameError::NoActiveSession => "NO_ACTIVE_SESSION",
            GameError::ForbiddenWhileQueued => "FORBIDDEN_WHILE_QUEUED",
            GameError::InvalidNumber(_) => "INVALID_NUMBER",
            GameError::AlreadyCompleted(_) => "ALREADY_COMPLETED",
            GameError::AlreadyOpen(_) => "ALREADY_OPEN",
            GameError::RoundNotFound(_) => "ROUND_NOT_FOUND",
            GameError::ConflictCreatingRound => "CONFLICT_CREATING_ROUND",
            GameError::Store(StoreError::Timeout(_)) => "STORE_TIMEOUT",
            GameError::Store(_) => "STORE_ERROR",
        }
    }

    /// True for guard violations, false for infrastructure failures
    pub fn is_domain(&self) -> bool {
        !matches!(self, GameError::Store(_))
    }
}

/// Record store failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Uniqueness violation: another round is already open
    #[error("Another round is already open")]
    OpenRoundExists,

    /// Compare-and-swap on round status failed
    #[error("Round {0} is not in the expected status")]
    StatusConflict(RoundId),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A write would break a data-model invariant
    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Store call timed out after {0}ms")]
    Timeout(u64),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Corrupted data: {0}")]
    Corrupted(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupted(e.to_string())
    }
}

/// Configuration and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

impl ConfigurationError {
    pub fn invalid(field: &str, value: impl ToString, reason: &str) -> Self {
        ConfigurationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Root error type for process wiring (binary, server startup)
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),
}

pub type GameResult<T> = Result<T, GameError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type ServiceResult<T> = Result<T, ServiceError>;
