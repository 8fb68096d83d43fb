//! Background completion of rounds whose deadline has passed

use super::{coordinator::RoundCoordinator, types::RoundOutcome};
use crate::errors::GameError;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::MissedTickBehavior;

/// Polls the open round every tick and completes it once expired.
///
/// Racing callers (an operator completing the same round) are expected; the
/// loser's `AlreadyCompleted` is not an error here.
pub struct RoundScheduler {
    coordinator: Arc<RoundCoordinator>,
    tick: Duration,
    running: Arc<AtomicBool>,
}

impl RoundScheduler {
    pub fn new(coordinator: Arc<RoundCoordinator>, tick: Duration) -> Self {
        Self {
            coordinator,
            tick: tick.max(Duration::from_millis(1)),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn spawn(coordinator: Arc<RoundCoordinator>, tick: Duration) -> Arc<Self> {
        let scheduler = Arc::new(Self::new(coordinator, tick));
        scheduler.clone().spawn_task();
        scheduler
    }

    fn spawn_task(self: Arc<Self>) {
        tokio::spawn(async move {
            tracing::info!(tick_ms = self.tick.as_millis() as u64, "round scheduler started");
            let mut tick = tokio::time::interval(self.tick);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while self.running.load(Ordering::SeqCst) {
                tick.tick().await;
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                self.run_once().await;
            }
            tracing::info!("round scheduler stopped");
        });
    }

    /// One scheduler pass; returns the outcome if a round was completed
    pub async fn run_once(&self) -> Option<RoundOutcome> {
        match self.coordinator.complete_expired_round().await {
            Ok(outcome) => outcome,
            Err(e @ (GameError::AlreadyCompleted(_) | GameError::RoundNotFound(_))) => {
                tracing::debug!("expired round already handled: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!(code = e.code(), "failed to complete expired round, retrying next tick: {}", e);
                None
            }
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::GameConfig,
        game::{clock::ManualClock, draw::FixedDraw, types::UserId},
        store::MemoryRecordStore,
    };

    fn coordinator(clock: Arc<ManualClock>) -> Arc<RoundCoordinator> {
        Arc::new(
            RoundCoordinator::builder(Arc::new(MemoryRecordStore::new()))
                .config(GameConfig {
                    round_duration_secs: 5,
                    ..GameConfig::default()
                })
                .clock(clock)
                .draw(Arc::new(FixedDraw(2)))
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_run_once_completes_only_expired_rounds() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(clock.clone());
        let scheduler = RoundScheduler::new(game.clone(), Duration::from_millis(10));

        assert!(scheduler.run_once().await.is_none());

        game.join_round(UserId::from("alice")).await.unwrap();
        game.choose_number(UserId::from("alice"), 2).await.unwrap();
        assert!(scheduler.run_once().await.is_none());

        clock.advance(chrono::Duration::seconds(6));
        let outcome = scheduler.run_once().await.expect("expired round completed");
        assert_eq!(outcome.winners.len(), 1);
        assert!(scheduler.run_once().await.is_none());
    }

    #[tokio::test]
    async fn test_spawned_scheduler_completes_round() {
        let clock = Arc::new(ManualClock::starting_now());
        let game = coordinator(clock.clone());
        let mut rx = game.subscribe();

        game.join_round(UserId::from("alice")).await.unwrap();
        clock.advance(chrono::Duration::seconds(6));

        let scheduler = RoundScheduler::spawn(game.clone(), Duration::from_millis(10));
        let completed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(crate::game::events::RoundEvent::RoundCompleted { winning_number, .. }) =
                    rx.recv().await
                {
                    return winning_number;
                }
            }
        })
        .await
        .expect("scheduler should complete the round");
        assert_eq!(completed, 2);

        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
