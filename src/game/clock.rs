//! Round deadlines
//!
//! `RoundClock` is a pure deadline check against the stored `ends_at`; the
//! only source of time is the injected `Clock`, so tests can move time
//! forward without sleeping.

use super::types::Round;
use chrono::{DateTime, Utc};
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Computes and checks round deadlines
#[derive(Clone)]
pub struct RoundClock {
    clock: Arc<dyn Clock>,
}

impl RoundClock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// `started_at + duration_secs`
    pub fn deadline(&self, started_at: DateTime<Utc>, duration_secs: u64) -> DateTime<Utc> {
        let secs = i64::try_from(duration_secs).unwrap_or(i64::MAX);
        started_at
            .checked_add_signed(chrono::Duration::seconds(secs.min(i64::MAX / 1_000)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Strictly past `ends_at`
    pub fn has_ended(&self, round: &Round) -> bool {
        self.now() > round.ends_at
    }

    /// `max(0, ends_at - now)`
    pub fn time_left(&self, round: &Round) -> Duration {
        (round.ends_at - self.now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whole seconds left, rounded down
    pub fn time_left_secs(&self, round: &Round) -> u64 {
        self.time_left(round).as_secs()
    }
}

impl Default for RoundClock {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::{NewRound, RoundId};

    fn round_ending_in(clock: &RoundClock, secs: u64) -> Round {
        let started_at = clock.now();
        NewRound {
            started_at,
            ends_at: clock.deadline(started_at, secs),
            started_by: None,
        }
        .into_round(RoundId::new())
    }

    #[test]
    fn test_deadline_and_time_left() {
        let manual = Arc::new(ManualClock::starting_now());
        let clock = RoundClock::new(manual.clone());
        let round = round_ending_in(&clock, 20);

        assert_eq!(round.ends_at - round.started_at, chrono::Duration::seconds(20));
        assert_eq!(clock.time_left_secs(&round), 20);
        assert!(!clock.has_ended(&round));

        manual.advance(chrono::Duration::milliseconds(12_500));
        assert_eq!(clock.time_left_secs(&round), 7);
    }

    #[test]
    fn test_deadline_boundary_is_exclusive() {
        let manual = Arc::new(ManualClock::starting_now());
        let clock = RoundClock::new(manual.clone());
        let round = round_ending_in(&clock, 5);

        manual.set(round.ends_at);
        assert!(!clock.has_ended(&round));
        assert_eq!(clock.time_left(&round), Duration::ZERO);

        manual.advance(chrono::Duration::milliseconds(1));
        assert!(clock.has_ended(&round));
    }

    #[test]
    fn test_time_left_never_negative() {
        let manual = Arc::new(ManualClock::starting_now());
        let clock = RoundClock::new(manual.clone());
        let round = round_ending_in(&clock, 1);

        manual.advance(chrono::Duration::minutes(10));
        assert_eq!(clock.time_left_secs(&round), 0);
    }
}
