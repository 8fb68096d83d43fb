use crate::errors::{GameError, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Lowest pickable number
pub const MIN_NUMBER: u8 = 1;
/// Highest pickable number
pub const MAX_NUMBER: u8 = 9;

/// Round identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(pub Uuid);

impl RoundId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoundId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Participant identifier; its ordering breaks `joined_at` ties in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Opaque reference to an externally issued user identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Round lifecycle state. Completed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Open,
    Completed,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundStatus::Open => write!(f, "open"),
            RoundStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One timed instance of the game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: RoundStatus,
    /// Set if and only if `status` is Completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_number: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_by: Option<UserId>,
}

impl Round {
    pub fn is_open(&self) -> bool {
        self.status == RoundStatus::Open
    }

    pub fn is_completed(&self) -> bool {
        self.status == RoundStatus::Completed
    }
}

/// A user's seat (or queue slot) in a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub round_id: RoundId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
    pub in_queue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_number: Option<u8>,
    #[serde(default)]
    pub is_winner: bool,
}

impl Participant {
    /// Holding a seat: eligible to pick and to win
    pub fn is_active(&self) -> bool {
        !self.in_queue
    }
}

/// A round together with all of its participants, ordered by `joined_at` then id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round: Round,
    pub participants: Vec<Participant>,
}

impl RoundSnapshot {
    pub fn active_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_active()).count()
    }

    pub fn queued_count(&self) -> usize {
        self.participants.iter().filter(|p| p.in_queue).count()
    }

    pub fn participant_for(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.user_id == user_id)
    }

    pub fn winners(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.is_winner)
    }
}

/// Fields for a new round
#[derive(Debug, Clone)]
pub struct NewRound {
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub started_by: Option<UserId>,
}

impl NewRound {
    pub fn into_round(self, id: RoundId) -> Round {
        Round {
            id,
            started_at: self.started_at,
            ends_at: self.ends_at,
            status: RoundStatus::Open,
            winning_number: None,
            started_by: self.started_by,
        }
    }
}

/// Fields for a new participant
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub round_id: RoundId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
    pub in_queue: bool,
}

impl NewParticipant {
    pub fn into_participant(self, id: ParticipantId) -> Participant {
        Participant {
            id,
            round_id: self.round_id,
            user_id: self.user_id,
            joined_at: self.joined_at,
            in_queue: self.in_queue,
            chosen_number: None,
            is_winner: false,
        }
    }
}

/// Partial participant update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantUpdate {
    pub in_queue: Option<bool>,
    pub chosen_number: Option<u8>,
}

impl ParticipantUpdate {
    /// Move a queued participant into an active seat
    pub fn promote() -> Self {
        Self {
            in_queue: Some(false),
            ..Default::default()
        }
    }

    pub fn choose(number: u8) -> Self {
        Self {
            chosen_number: Some(number),
            ..Default::default()
        }
    }

    /// Apply to a stored participant, rejecting writes that break its invariants
    pub fn apply(&self, participant: &mut Participant) -> StoreResult<()> {
        let in_queue = self.in_queue.unwrap_or(participant.in_queue);
        if self.chosen_number.is_some() && in_queue {
            return Err(StoreError::Constraint(format!(
                "participant {} cannot choose a number while queued",
                participant.id
            )));
        }
        if let Some(number) = self.chosen_number {
            if !(MIN_NUMBER..=MAX_NUMBER).contains(&number) {
                return Err(StoreError::Constraint(format!(
                    "chosen number {} out of range",
                    number
                )));
            }
        }

        participant.in_queue = in_queue;
        if self.chosen_number.is_some() {
            participant.chosen_number = self.chosen_number;
        }
        Ok(())
    }
}

/// Partial round update with an optional compare-and-swap on status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundUpdate {
    pub status: Option<RoundStatus>,
    pub winning_number: Option<u8>,
    pub expected_status: Option<RoundStatus>,
}

impl RoundUpdate {
    /// Open -> Completed with the drawn number, in one write
    pub fn complete(winning_number: u8) -> Self {
        Self {
            status: Some(RoundStatus::Completed),
            winning_number: Some(winning_number),
            expected_status: Some(RoundStatus::Open),
        }
    }

    pub fn apply(&self, round: &mut Round) -> StoreResult<()> {
        if let Some(expected) = self.expected_status {
            if round.status != expected {
                return Err(StoreError::StatusConflict(round.id));
            }
        }

        let status = self.status.unwrap_or(round.status);
        let winning_number = self.winning_number.or(round.winning_number);
        match (status, winning_number) {
            (RoundStatus::Open, Some(_)) => {
                return Err(StoreError::Constraint(format!(
                    "round {} cannot carry a winning number while open",
                    round.id
                )))
            }
            (RoundStatus::Completed, None) => {
                return Err(StoreError::Constraint(format!(
                    "round {} cannot complete without a winning number",
                    round.id
                )))
            }
            (_, Some(n)) if !(MIN_NUMBER..=MAX_NUMBER).contains(&n) => {
                return Err(StoreError::Constraint(format!(
                    "winning number {} out of range",
                    n
                )))
            }
            _ => {}
        }

        round.status = status;
        round.winning_number = winning_number;
        Ok(())
    }
}

/// Filter over completed rounds by start time (inclusive bounds)
#[derive(Debug, Clone, Default)]
pub struct RoundQuery {
    pub started_after: Option<DateTime<Utc>>,
    pub started_before: Option<DateTime<Utc>>,
}

impl RoundQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            started_after: Some(start),
            started_before: None,
        }
    }

    pub fn matches(&self, round: &Round) -> bool {
        self.started_after.map_or(true, |start| round.started_at >= start)
            && self.started_before.map_or(true, |end| round.started_at <= end)
    }
}

/// QueueManager admission decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Admission {
    Active,
    Queued,
}

impl Admission {
    pub fn is_queued(self) -> bool {
        self == Admission::Queued
    }
}

/// Validate a pick and narrow it to the stored representation
pub fn validate_number(number: i64) -> Result<u8, GameError> {
    if (MIN_NUMBER as i64..=MAX_NUMBER as i64).contains(&number) {
        Ok(number as u8)
    } else {
        Err(GameError::InvalidNumber(number))
    }
}

/// Read-only projection of the current round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub has_active_session: bool,
    pub time_left_secs: u64,
    pub participant_count: usize,
    pub queue_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_id: Option<RoundId>,
}

impl SessionStatus {
    pub fn idle() -> Self {
        Self {
            has_active_session: false,
            time_left_secs: 0,
            participant_count: 0,
            queue_count: 0,
            round_id: None,
        }
    }
}

/// Result of a voluntary leave
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveOutcome {
    pub left: Participant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted: Option<Participant>,
}

/// Result of completing a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: Round,
    pub winners: Vec<Participant>,
}
