//! Round lifecycle orchestration
//!
//! `RoundCoordinator` owns the guard logic for every player operation. Each
//! mutation of a round runs under that round's serialization point and
//! re-reads the round from the store inside it, so admission counts, queue
//! promotion and completion observe every earlier serialized write.

use super::{
    clock::{Clock, RoundClock},
    draw::{DrawSource, RandomDraw},
    events::{EventBus, RoundEvent},
    queue::QueueManager,
    types::{
        validate_number, LeaveOutcome, NewParticipant, NewRound, Participant, ParticipantUpdate,
        Round, RoundId, RoundOutcome, RoundSnapshot, SessionStatus, UserId, MAX_NUMBER, MIN_NUMBER,
    },
};
use crate::{
    config::GameConfig,
    errors::{ConfigurationError, GameError, GameResult, StoreError},
    metrics::GameMetrics,
    store::{RecordStore, TimeoutStore},
};
use dashmap::DashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

pub struct RoundCoordinator {
    store: Arc<dyn RecordStore>,
    clock: RoundClock,
    draw: Arc<dyn DrawSource>,
    queue: QueueManager,
    config: RwLock<GameConfig>,
    round_locks: DashMap<RoundId, Arc<Mutex<()>>>,
    events: EventBus,
    metrics: Arc<GameMetrics>,
}

impl RoundCoordinator {
    pub fn builder(store: Arc<dyn RecordStore>) -> RoundCoordinatorBuilder {
        RoundCoordinatorBuilder::new(store)
    }

    /// The unique open round with its participants
    pub async fn get_current_round(&self) -> GameResult<Option<RoundSnapshot>> {
        Ok(self.store.find_open_round().await?)
    }

    /// Open a new round; `AlreadyOpen` while another round is open
    pub async fn create_round(&self, started_by: Option<UserId>) -> GameResult<Round> {
        let config = self.config();
        let result = match self.insert_round(started_by, &config).await {
            Err(GameError::ConflictCreatingRound) => match self.store.find_open_round().await {
                Ok(Some(open)) => Err(GameError::AlreadyOpen(open.round.id)),
                Ok(None) => Err(GameError::ConflictCreatingRound),
                Err(e) => Err(e.into()),
            },
            other => other,
        };
        self.observe("create_round", result)
    }

    /// Seat or queue `user_id` in the open round, opening one if none exists
    pub async fn join_round(&self, user_id: UserId) -> GameResult<Participant> {
        let config = self.config();
        let result = async {
            let round = self.current_or_new_round(&user_id, &config).await?;
            self.admit_into(round.id, &user_id, &config).await
        }
        .await;
        self.observe("join_round", result)
    }

    /// Remove the caller from the open round; a vacated seat goes to the head of the queue
    pub async fn leave_round(&self, user_id: UserId) -> GameResult<LeaveOutcome> {
        let result = self.leave_open_round(&user_id).await;
        self.observe("leave_round", result)
    }

    /// Record the caller's pick; a later pick overwrites an earlier one
    pub async fn choose_number(&self, user_id: UserId, number: i64) -> GameResult<Participant> {
        let result = async {
            let number = validate_number(number)?;
            self.pick_in_open_round(&user_id, number).await
        }
        .await;
        self.observe("choose_number", result)
    }

    /// Draw the winning number and mark winners. At most once per round.
    pub async fn complete_round(&self, round_id: RoundId) -> GameResult<RoundOutcome> {
        let result = self.complete(round_id).await;
        self.observe("complete_round", result)
    }

    /// Complete the open round if its deadline has passed
    pub async fn complete_expired_round(&self) -> GameResult<Option<RoundOutcome>> {
        let Some(open) = self.store.find_open_round().await? else {
            return Ok(None);
        };
        if !self.clock.has_ended(&open.round) {
            return Ok(None);
        }
        self.complete_round(open.round.id).await.map(Some)
    }

    pub async fn get_status(&self) -> GameResult<SessionStatus> {
        let Some(open) = self.store.find_open_round().await? else {
            return Ok(SessionStatus::idle());
        };
        Ok(SessionStatus {
            has_active_session: true,
            time_left_secs: self.clock.time_left_secs(&open.round),
            participant_count: open.active_count(),
            queue_count: open.queued_count(),
            round_id: Some(open.round.id),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    /// Swap duration and capacity; applies to operations started afterwards.
    /// The store timeout is fixed at build time.
    pub fn update_config(&self, config: GameConfig) -> Result<(), ConfigurationError> {
        config.validate()?;
        info!(
            round_duration_secs = config.round_duration_secs,
            max_active_participants = config.max_active_participants,
            "game config updated"
        );
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    pub fn config(&self) -> GameConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn metrics(&self) -> Arc<GameMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn clock(&self) -> &RoundClock {
        &self.clock
    }

    async fn lock_round(&self, round_id: RoundId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(&self.round_locks.entry(round_id).or_default());
        lock.lock_owned().await
    }

    /// Drop the serialization point of a round that can no longer change
    fn release_round_lock(&self, round_id: RoundId) {
        self.round_locks.remove(&round_id);
    }

    async fn insert_round(&self, started_by: Option<UserId>, config: &GameConfig) -> GameResult<Round> {
        let started_at = self.clock.now();
        let new_round = NewRound {
            started_at,
            ends_at: self.clock.deadline(started_at, config.round_duration_secs),
            started_by,
        };

        let round = self
            .store
            .create_round(new_round)
            .await
            .map_err(|e| match e {
                StoreError::OpenRoundExists => GameError::ConflictCreatingRound,
                other => other.into(),
            })?;

        info!(round_id = %round.id, ends_at = %round.ends_at, "round opened");
        self.metrics.record_round_created();
        self.events.publish(RoundEvent::RoundStarted {
            round_id: round.id,
            ends_at: round.ends_at,
        });
        Ok(round)
    }

    /// Open round, creating one if needed. A lost creation race re-reads once.
    async fn current_or_new_round(&self, user_id: &UserId, config: &GameConfig) -> GameResult<Round> {
        if let Some(open) = self.store.find_open_round().await? {
            return Ok(open.round);
        }

        match self.insert_round(Some(user_id.clone()), config).await {
            Err(GameError::ConflictCreatingRound) => {
                debug!(%user_id, "lost round creation race, re-reading");
                self.store
                    .find_open_round()
                    .await?
                    .map(|open| open.round)
                    .ok_or(GameError::ConflictCreatingRound)
            }
            other => other,
        }
    }

    async fn admit_into(
        &self,
        round_id: RoundId,
        user_id: &UserId,
        config: &GameConfig,
    ) -> GameResult<Participant> {
        let _guard = self.lock_round(round_id).await;
        let Some(snapshot) = self.store.find_round(round_id).await? else {
            self.release_round_lock(round_id);
            return Err(GameError::RoundNotFound(round_id));
        };

        if snapshot.round.is_completed() {
            self.release_round_lock(round_id);
            return Err(GameError::RoundEnded);
        }
        if self.clock.has_ended(&snapshot.round) {
            return Err(GameError::RoundEnded);
        }
        if snapshot.participant_for(user_id).is_some() {
            return Err(GameError::AlreadyJoined);
        }

        let admission = self.queue.admit(
            round_id,
            user_id,
            snapshot.active_count(),
            config.max_active_participants,
        );
        let participant = self
            .store
            .create_participant(NewParticipant {
                round_id,
                user_id: user_id.clone(),
                joined_at: self.clock.now(),
                in_queue: admission.is_queued(),
            })
            .await
            .map_err(|e| match e {
                StoreError::StatusConflict(_) => GameError::RoundEnded,
                other => other.into(),
            })?;

        info!(%round_id, %user_id, queued = participant.in_queue, "participant joined");
        self.metrics.record_join(participant.in_queue);
        self.events.publish(RoundEvent::ParticipantJoined {
            round_id,
            user_id: user_id.clone(),
            queued: participant.in_queue,
        });
        Ok(participant)
    }

    /// Open-round snapshot re-read under the round lock; `NoActiveSession` if it closed meanwhile
    async fn locked_open_round(&self) -> GameResult<(OwnedMutexGuard<()>, RoundSnapshot)> {
        let open = self
            .store
            .find_open_round()
            .await?
            .ok_or(GameError::NoActiveSession)?;
        let round_id = open.round.id;

        let guard = self.lock_round(round_id).await;
        match self.store.find_round(round_id).await? {
            Some(snapshot) if snapshot.round.is_open() => Ok((guard, snapshot)),
            _ => {
                self.release_round_lock(round_id);
                Err(GameError::NoActiveSession)
            }
        }
    }

    async fn leave_open_round(&self, user_id: &UserId) -> GameResult<LeaveOutcome> {
        let (_guard, snapshot) = self.locked_open_round().await?;
        let round_id = snapshot.round.id;
        let participant_id = snapshot
            .participant_for(user_id)
            .map(|p| p.id)
            .ok_or(GameError::NoActiveSession)?;

        // Delete and promotion land in one store write
        let LeaveOutcome { left, promoted } = self
            .store
            .leave_participant(participant_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => GameError::NoActiveSession,
                other => other.into(),
            })?;
        self.events.publish(RoundEvent::ParticipantLeft {
            round_id,
            user_id: user_id.clone(),
        });
        if let Some(ref next) = promoted {
            self.events.publish(RoundEvent::ParticipantPromoted {
                round_id,
                user_id: next.user_id.clone(),
            });
        }

        info!(
            %round_id,
            %user_id,
            promoted = promoted.as_ref().map(|p| p.user_id.as_str()),
            "participant left"
        );
        self.metrics.record_leave(promoted.is_some());
        Ok(LeaveOutcome { left, promoted })
    }

    async fn pick_in_open_round(&self, user_id: &UserId, number: u8) -> GameResult<Participant> {
        let (_guard, snapshot) = self.locked_open_round().await?;
        let round_id = snapshot.round.id;
        let participant = snapshot
            .participant_for(user_id)
            .ok_or(GameError::NoActiveSession)?;
        if participant.in_queue {
            return Err(GameError::ForbiddenWhileQueued);
        }

        let updated = self
            .store
            .update_participant(participant.id, ParticipantUpdate::choose(number))
            .await?;

        debug!(%round_id, %user_id, "number chosen");
        self.metrics.record_pick();
        self.events.publish(RoundEvent::NumberChosen {
            round_id,
            user_id: user_id.clone(),
        });
        Ok(updated)
    }

    async fn complete(&self, round_id: RoundId) -> GameResult<RoundOutcome> {
        let guard = self.lock_round(round_id).await;
        let snapshot = match self.store.find_round(round_id).await? {
            Some(snapshot) if snapshot.round.is_open() => snapshot,
            Some(_) => {
                self.release_round_lock(round_id);
                return Err(GameError::AlreadyCompleted(round_id));
            }
            None => {
                self.release_round_lock(round_id);
                return Err(GameError::RoundNotFound(round_id));
            }
        };

        let winning_number = self.draw.draw(&snapshot.round);
        if !(MIN_NUMBER..=MAX_NUMBER).contains(&winning_number) {
            return Err(GameError::Store(StoreError::Constraint(format!(
                "draw source produced {} outside {}..={}",
                winning_number, MIN_NUMBER, MAX_NUMBER
            ))));
        }
        let completed = self
            .store
            .complete_round(round_id, winning_number)
            .await
            .map_err(|e| match e {
                StoreError::StatusConflict(id) => GameError::AlreadyCompleted(id),
                other => other.into(),
            })?;

        self.release_round_lock(round_id);
        drop(guard);

        let winners: Vec<Participant> = completed.winners().cloned().collect();
        info!(
            %round_id,
            winning_number,
            winners = winners.len(),
            participants = completed.participants.len(),
            "round completed"
        );
        self.metrics.record_round_completed(winners.len());
        self.events.publish(RoundEvent::RoundCompleted {
            round_id,
            winning_number,
            winners: winners.iter().map(|p| p.user_id.clone()).collect(),
        });
        Ok(RoundOutcome {
            round: completed.round,
            winners,
        })
    }

    /// Log and count rejections; domain rejections at debug, store failures at warn
    fn observe<T>(&self, operation: &'static str, result: GameResult<T>) -> GameResult<T> {
        if let Err(ref e) = result {
            if e.is_domain() {
                debug!(operation, code = e.code(), "operation rejected: {}", e);
            } else {
                warn!(operation, code = e.code(), "store failure: {}", e);
            }
            self.metrics.record_rejection(e.code());
        }
        result
    }
}

/// Assembles a [`RoundCoordinator`]; the store is wrapped in a [`TimeoutStore`]
pub struct RoundCoordinatorBuilder {
    store: Arc<dyn RecordStore>,
    config: GameConfig,
    clock: Option<Arc<dyn Clock>>,
    draw: Option<Arc<dyn DrawSource>>,
    events: Option<EventBus>,
    metrics: Option<Arc<GameMetrics>>,
}

impl RoundCoordinatorBuilder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            config: GameConfig::default(),
            clock: None,
            draw: None,
            events: None,
            metrics: None,
        }
    }

    pub fn config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn draw(mut self, draw: Arc<dyn DrawSource>) -> Self {
        self.draw = Some(draw);
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn metrics(mut self, metrics: Arc<GameMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<RoundCoordinator, ConfigurationError> {
        self.config.validate()?;

        let store: Arc<dyn RecordStore> =
            Arc::new(TimeoutStore::new(self.store, self.config.store_timeout()));
        Ok(RoundCoordinator {
            store,
            clock: self.clock.map(RoundClock::new).unwrap_or_default(),
            draw: self.draw.unwrap_or_else(|| Arc::new(RandomDraw::new())),
            queue: QueueManager::new(),
            config: RwLock::new(self.config),
            round_locks: DashMap::new(),
            events: self.events.unwrap_or_default(),
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::StoreResult,
        game::{
            clock::ManualClock,
            draw::FixedDraw,
            types::{NewParticipant, NewRound, ParticipantId, RoundQuery, RoundUpdate},
        },
        store::MemoryRecordStore,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store whose backend drops the next `leave_failures` leaves and
    /// never answers queue lookups
    struct FlakyStore {
        inner: MemoryRecordStore,
        leave_failures: AtomicUsize,
    }

    impl FlakyStore {
        fn new(leave_failures: usize) -> Self {
            Self {
                inner: MemoryRecordStore::new(),
                leave_failures: AtomicUsize::new(leave_failures),
            }
        }
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn find_open_round(&self) -> StoreResult<Option<RoundSnapshot>> {
            self.inner.find_open_round().await
        }
        async fn find_round(&self, id: RoundId) -> StoreResult<Option<RoundSnapshot>> {
            self.inner.find_round(id).await
        }
        async fn create_round(&self, new_round: NewRound) -> StoreResult<Round> {
            self.inner.create_round(new_round).await
        }
        async fn create_participant(&self, p: NewParticipant) -> StoreResult<Participant> {
            self.inner.create_participant(p).await
        }
        async fn delete_participant(&self, id: ParticipantId) -> StoreResult<()> {
            self.inner.delete_participant(id).await
        }
        async fn update_participant(
            &self,
            id: ParticipantId,
            update: ParticipantUpdate,
        ) -> StoreResult<Participant> {
            self.inner.update_participant(id, update).await
        }
        async fn update_round(&self, id: RoundId, update: RoundUpdate) -> StoreResult<Round> {
            self.inner.update_round(id, update).await
        }
        async fn bulk_mark_winners(&self, round_id: RoundId, n: u8) -> StoreResult<usize> {
            self.inner.bulk_mark_winners(round_id, n).await
        }
        async fn find_queued_participants(&self, _round_id: RoundId) -> StoreResult<Vec<Participant>> {
            Err(StoreError::Backend("down".to_string()))
        }
        async fn completed_rounds(&self, query: RoundQuery) -> StoreResult<Vec<RoundSnapshot>> {
            self.inner.completed_rounds(query).await
        }
        async fn complete_round(&self, id: RoundId, n: u8) -> StoreResult<RoundSnapshot> {
            self.inner.complete_round(id, n).await
        }
        async fn leave_participant(&self, id: ParticipantId) -> StoreResult<LeaveOutcome> {
            let failing = self
                .leave_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(StoreError::Backend("down".to_string()));
            }
            self.inner.leave_participant(id).await
        }
    }

    fn coordinator(capacity: usize, clock: Arc<ManualClock>) -> RoundCoordinator {
        RoundCoordinator::builder(Arc::new(MemoryRecordStore::new()))
            .config(GameConfig {
                round_duration_secs: 20,
                max_active_participants: capacity,
                store_timeout_ms: 1_000,
            })
            .clock(clock)
            .draw(Arc::new(FixedDraw(5)))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_join_opens_round() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(10, clock);

        let participant = game.join_round(UserId::from("alice")).await.unwrap();
        assert!(!participant.in_queue);

        let current = game.get_current_round().await.unwrap().unwrap();
        assert_eq!(current.round.started_by, Some(UserId::from("alice")));
        assert_eq!(current.round.ends_at - current.round.started_at, chrono::Duration::seconds(20));
    }

    #[tokio::test]
    async fn test_join_twice_rejected() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(10, clock);

        game.join_round(UserId::from("alice")).await.unwrap();
        let err = game.join_round(UserId::from("alice")).await.unwrap_err();
        assert!(matches!(err, GameError::AlreadyJoined));
        assert_eq!(game.metrics().rejections_for("ALREADY_JOINED"), 1);
    }

    #[tokio::test]
    async fn test_join_after_deadline() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(10, clock.clone());

        game.join_round(UserId::from("alice")).await.unwrap();
        clock.advance(chrono::Duration::seconds(21));
        let err = game.join_round(UserId::from("bob")).await.unwrap_err();
        assert!(matches!(err, GameError::RoundEnded));
    }

    #[tokio::test]
    async fn test_create_round_while_open() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(10, clock);

        let round = game.create_round(None).await.unwrap();
        let err = game.create_round(None).await.unwrap_err();
        assert!(matches!(err, GameError::AlreadyOpen(id) if id == round.id));
    }

    #[tokio::test]
    async fn test_leave_without_session() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(10, clock);

        let err = game.leave_round(UserId::from("ghost")).await.unwrap_err();
        assert!(matches!(err, GameError::NoActiveSession));

        game.join_round(UserId::from("alice")).await.unwrap();
        game.leave_round(UserId::from("alice")).await.unwrap();
        let err = game.leave_round(UserId::from("alice")).await.unwrap_err();
        assert!(matches!(err, GameError::NoActiveSession));
    }

    #[tokio::test]
    async fn test_invalid_number_checked_first() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(10, clock);

        let err = game.choose_number(UserId::from("nobody"), 0).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidNumber(0)));
        let err = game.choose_number(UserId::from("nobody"), 5).await.unwrap_err();
        assert!(matches!(err, GameError::NoActiveSession));
    }

    #[tokio::test]
    async fn test_complete_unknown_round() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(10, clock);

        let missing = RoundId::new();
        let err = game.complete_round(missing).await.unwrap_err();
        assert!(matches!(err, GameError::RoundNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_complete_expired_round_waits_for_deadline() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(10, clock.clone());

        game.join_round(UserId::from("alice")).await.unwrap();
        assert!(game.complete_expired_round().await.unwrap().is_none());

        clock.advance(chrono::Duration::seconds(20));
        assert!(game.complete_expired_round().await.unwrap().is_none());

        clock.advance(chrono::Duration::seconds(1));
        let outcome = game.complete_expired_round().await.unwrap().unwrap();
        assert_eq!(outcome.round.winning_number, Some(5));
        assert!(game.get_current_round().await.unwrap().is_none());
        assert!(game.round_locks.is_empty());
    }

    #[tokio::test]
    async fn test_update_config_validates() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(10, clock);

        let mut config = game.config();
        config.max_active_participants = 0;
        assert!(game.update_config(config).is_err());
        assert_eq!(game.config().max_active_participants, 10);

        let mut config = game.config();
        config.max_active_participants = 1;
        game.update_config(config).unwrap();
        game.join_round(UserId::from("a")).await.unwrap();
        assert!(game.join_round(UserId::from("b")).await.unwrap().in_queue);
    }

    #[tokio::test]
    async fn test_events_follow_lifecycle() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(1, clock);
        let mut rx = game.subscribe();

        game.join_round(UserId::from("a")).await.unwrap();
        game.join_round(UserId::from("b")).await.unwrap();
        game.leave_round(UserId::from("a")).await.unwrap();

        let kinds: Vec<&'static str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| match event {
                RoundEvent::RoundStarted { .. } => "started",
                RoundEvent::ParticipantJoined { queued: false, .. } => "joined",
                RoundEvent::ParticipantJoined { queued: true, .. } => "queued",
                RoundEvent::ParticipantLeft { .. } => "left",
                RoundEvent::ParticipantPromoted { .. } => "promoted",
                RoundEvent::NumberChosen { .. } => "chosen",
                RoundEvent::RoundCompleted { .. } => "completed",
            })
            .collect();
        assert_eq!(kinds, vec!["started", "joined", "queued", "left", "promoted"]);
    }

    #[tokio::test]
    async fn test_failed_leave_keeps_seat_and_queue() {
        let game = RoundCoordinator::builder(Arc::new(FlakyStore::new(1)))
            .config(GameConfig {
                max_active_participants: 1,
                ..GameConfig::default()
            })
            .clock(Arc::new(ManualClock::starting_now()))
            .build()
            .unwrap();
        game.join_round(UserId::from("seated")).await.unwrap();
        game.join_round(UserId::from("waiting")).await.unwrap();

        let err = game.leave_round(UserId::from("seated")).await.unwrap_err();
        assert!(matches!(err, GameError::Store(StoreError::Backend(_))));
        let status = game.get_status().await.unwrap();
        assert_eq!((status.participant_count, status.queue_count), (1, 1));

        // Queue lookups still fail; the retry must not depend on them
        let outcome = game.leave_round(UserId::from("seated")).await.unwrap();
        assert_eq!(outcome.promoted.unwrap().user_id.as_str(), "waiting");
        let status = game.get_status().await.unwrap();
        assert_eq!((status.participant_count, status.queue_count), (1, 0));
    }

    #[tokio::test]
    async fn test_stale_operations_leave_no_lock_entries() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(10, clock);

        let joined = game.join_round(UserId::from("alice")).await.unwrap();
        game.complete_round(joined.round_id).await.unwrap();
        assert!(game.round_locks.is_empty());

        // A join that resolved the round just before it completed
        let config = game.config();
        let err = game
            .admit_into(joined.round_id, &UserId::from("bob"), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::RoundEnded));

        let err = game.complete_round(joined.round_id).await.unwrap_err();
        assert!(matches!(err, GameError::AlreadyCompleted(_)));
        let err = game.complete_round(RoundId::new()).await.unwrap_err();
        assert!(matches!(err, GameError::RoundNotFound(_)));

        assert!(game.round_locks.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_draw_is_rejected() {
        let game = RoundCoordinator::builder(Arc::new(MemoryRecordStore::new()))
            .draw(Arc::new(FixedDraw(0)))
            .build()
            .unwrap();
        let joined = game.join_round(UserId::from("alice")).await.unwrap();

        let err = game.complete_round(joined.round_id).await.unwrap_err();
        assert!(matches!(err, GameError::Store(StoreError::Constraint(_))));

        let current = game.get_current_round().await.unwrap().unwrap();
        assert_eq!(current.round.id, joined.round_id);
        assert_eq!(current.round.winning_number, None);
    }
}
