//! Record store interface for rounds and participants
//!
//! The coordinator only needs the operations below. Implementations must
//! enforce "at most one open round" inside `create_round` and report a
//! violation as [`StoreError::OpenRoundExists`].

pub mod memory;
pub mod rocks;
pub mod timeout;

pub use memory::MemoryRecordStore;
pub use rocks::RocksRecordStore;
pub use timeout::TimeoutStore;

use crate::{
    config::{StorageBackend, StorageConfig},
    errors::{StoreError, StoreResult},
    game::{
        queue::QueueManager,
        types::{
            LeaveOutcome, NewParticipant, NewRound, Participant, ParticipantId, ParticipantUpdate,
            Round, RoundId, RoundQuery, RoundSnapshot, RoundUpdate,
        },
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Open the backend selected by `config`
pub fn open_store(config: &StorageConfig) -> StoreResult<Arc<dyn RecordStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory record store");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
        StorageBackend::Rocksdb => {
            tracing::info!(data_dir = %config.data_dir, "opening RocksDB record store");
            Ok(Arc::new(RocksRecordStore::open(&config.data_dir)?))
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The open round with its participants, if any
    async fn find_open_round(&self) -> StoreResult<Option<RoundSnapshot>>;

    async fn find_round(&self, id: RoundId) -> StoreResult<Option<RoundSnapshot>>;

    /// Fails with `OpenRoundExists` if another round is open
    async fn create_round(&self, new_round: NewRound) -> StoreResult<Round>;

    async fn create_participant(&self, new_participant: NewParticipant) -> StoreResult<Participant>;

    async fn delete_participant(&self, id: ParticipantId) -> StoreResult<()>;

    async fn update_participant(
        &self,
        id: ParticipantId,
        update: ParticipantUpdate,
    ) -> StoreResult<Participant>;

    /// Fails with `StatusConflict` when `update.expected_status` does not match
    async fn update_round(&self, id: RoundId, update: RoundUpdate) -> StoreResult<Round>;

    /// Mark every active participant whose pick equals `winning_number`; returns how many
    async fn bulk_mark_winners(&self, round_id: RoundId, winning_number: u8) -> StoreResult<usize>;

    /// Queued participants ordered by `joined_at`, then id
    async fn find_queued_participants(&self, round_id: RoundId) -> StoreResult<Vec<Participant>>;

    /// Completed rounds matching `query`, newest first
    async fn completed_rounds(&self, query: RoundQuery) -> StoreResult<Vec<RoundSnapshot>>;

    /// Open -> Completed plus winner marking.
    ///
    /// Stores that can write both in one transaction should override this.
    async fn complete_round(&self, id: RoundId, winning_number: u8) -> StoreResult<RoundSnapshot> {
        self.update_round(id, RoundUpdate::complete(winning_number))
            .await?;
        self.bulk_mark_winners(id, winning_number).await?;
        self.find_round(id)
            .await?
            .ok_or_else(|| StoreError::not_found("round", id))
    }

    /// Remove a participant and, if it held a seat, hand the seat to the
    /// earliest-joined queued participant of the same round.
    ///
    /// The default sequences separate calls. Stores that can write both in
    /// one transaction should override this.
    async fn leave_participant(&self, id: ParticipantId) -> StoreResult<LeaveOutcome> {
        let left = self
            .find_open_round()
            .await?
            .and_then(|open| open.participants.into_iter().find(|p| p.id == id))
            .ok_or_else(|| StoreError::not_found("participant", id))?;

        self.delete_participant(id).await?;
        if !left.is_active() {
            return Ok(LeaveOutcome { left, promoted: None });
        }

        let queued = self.find_queued_participants(left.round_id).await?;
        let promoted = match QueueManager::new().promote_next(&queued)? {
            Some(next) => Some(
                self.update_participant(next.id, ParticipantUpdate::promote())
                    .await?,
            ),
            None => None,
        };
        Ok(LeaveOutcome { left, promoted })
    }
}
