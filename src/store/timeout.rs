use super::RecordStore;
use crate::{
    errors::{StoreError, StoreResult},
    game::types::{
        LeaveOutcome, NewParticipant, NewRound, Participant, ParticipantId, ParticipantUpdate,
        Round, RoundId, RoundQuery, RoundSnapshot, RoundUpdate,
    },
};
use async_trait::async_trait;
use std::{future::Future, sync::Arc, time::Duration};

/// Bounds every call on the wrapped store; an expired call becomes `StoreError::Timeout`
pub struct TimeoutStore {
    inner: Arc<dyn RecordStore>,
    timeout: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn RecordStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn guard<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "record store call timed out");
                Err(StoreError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }
}

#[async_trait]
impl RecordStore for TimeoutStore {
    async fn find_open_round(&self) -> StoreResult<Option<RoundSnapshot>> {
        self.guard(self.inner.find_open_round()).await
    }

    async fn find_round(&self, id: RoundId) -> StoreResult<Option<RoundSnapshot>> {
        self.guard(self.inner.find_round(id)).await
    }

    async fn create_round(&self, new_round: NewRound) -> StoreResult<Round> {
        self.guard(self.inner.create_round(new_round)).await
    }

    async fn create_participant(&self, new_participant: NewParticipant) -> StoreResult<Participant> {
        self.guard(self.inner.create_participant(new_participant)).await
    }

    async fn delete_participant(&self, id: ParticipantId) -> StoreResult<()> {
        self.guard(self.inner.delete_participant(id)).await
    }

    async fn update_participant(
        &self,
        id: ParticipantId,
        update: ParticipantUpdate,
    ) -> StoreResult<Participant> {
        self.guard(self.inner.update_participant(id, update)).await
    }

    async fn update_round(&self, id: RoundId, update: RoundUpdate) -> StoreResult<Round> {
        self.guard(self.inner.update_round(id, update)).await
    }

    async fn bulk_mark_winners(&self, round_id: RoundId, winning_number: u8) -> StoreResult<usize> {
        self.guard(self.inner.bulk_mark_winners(round_id, winning_number))
            .await
    }

    async fn find_queued_participants(&self, round_id: RoundId) -> StoreResult<Vec<Participant>> {
        self.guard(self.inner.find_queued_participants(round_id)).await
    }

    async fn completed_rounds(&self, query: RoundQuery) -> StoreResult<Vec<RoundSnapshot>> {
        self.guard(self.inner.completed_rounds(query)).await
    }

    async fn complete_round(&self, id: RoundId, winning_number: u8) -> StoreResult<RoundSnapshot> {
        self.guard(self.inner.complete_round(id, winning_number)).await
    }

    async fn leave_participant(&self, id: ParticipantId) -> StoreResult<LeaveOutcome> {
        self.guard(self.inner.leave_participant(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;

    /// Never answers
    struct StalledStore;

    #[async_trait]
    impl RecordStore for StalledStore {
        async fn find_open_round(&self) -> StoreResult<Option<RoundSnapshot>> {
            std::future::pending().await
        }
        async fn find_round(&self, _id: RoundId) -> StoreResult<Option<RoundSnapshot>> {
            std::future::pending().await
        }
        async fn create_round(&self, _new_round: NewRound) -> StoreResult<Round> {
            std::future::pending().await
        }
        async fn create_participant(&self, _p: NewParticipant) -> StoreResult<Participant> {
            std::future::pending().await
        }
        async fn delete_participant(&self, _id: ParticipantId) -> StoreResult<()> {
            std::future::pending().await
        }
        async fn update_participant(
            &self,
            _id: ParticipantId,
            _update: ParticipantUpdate,
        ) -> StoreResult<Participant> {
            std::future::pending().await
        }
        async fn update_round(&self, _id: RoundId, _update: RoundUpdate) -> StoreResult<Round> {
            std::future::pending().await
        }
        async fn bulk_mark_winners(&self, _round_id: RoundId, _n: u8) -> StoreResult<usize> {
            std::future::pending().await
        }
        async fn find_queued_participants(&self, _round_id: RoundId) -> StoreResult<Vec<Participant>> {
            std::future::pending().await
        }
        async fn completed_rounds(&self, _query: RoundQuery) -> StoreResult<Vec<RoundSnapshot>> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_call_times_out() {
        let store = TimeoutStore::new(Arc::new(StalledStore), Duration::from_millis(20));
        let err = store.find_open_round().await.unwrap_err();
        assert_eq!(err, StoreError::Timeout(20));
    }

    #[tokio::test]
    async fn test_passes_through_results() {
        let store = TimeoutStore::new(Arc::new(MemoryRecordStore::new()), Duration::from_secs(1));
        assert!(store.find_open_round().await.unwrap().is_none());
    }
}
