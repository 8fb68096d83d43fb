//! Leaderboard and per-user statistics over completed rounds
//!
//! Everything here is derived from `RecordStore::completed_rounds`; nothing
//! is cached. A participation counts as a game played whether it held a seat
//! or waited in the queue, and only seated participants can win.

use crate::{
    errors::{ConfigurationError, StoreResult},
    game::types::{RoundQuery, RoundSnapshot, UserId},
    store::RecordStore,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

pub const DEFAULT_TOP_LIMIT: usize = 10;
const PERIOD_WINNERS_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStanding {
    pub user_id: UserId,
    pub wins: u64,
    pub total_games: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWinner {
    pub user_id: UserId,
    pub wins: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_wins: u64,
    pub total_losses: u64,
    pub total_games: u64,
    /// Rounded percentage, 0 when no games were played
    pub win_rate: u32,
}

/// Leaderboard window, anchored in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    /// Weeks start on Sunday
    Week,
    Month,
}

impl Period {
    /// Inclusive lower bound of the window containing `now`
    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let first_day = match self {
            Period::Day => today,
            Period::Week => today - Duration::days(i64::from(today.weekday().num_days_from_sunday())),
            Period::Month => NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today),
        };
        Utc.from_utc_datetime(&first_day.and_time(NaiveTime::MIN))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Day => write!(f, "day"),
            Period::Week => write!(f, "week"),
            Period::Month => write!(f, "month"),
        }
    }
}

impl FromStr for Period {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(ConfigurationError::invalid(
                "period",
                other,
                "expected 'day', 'week' or 'month'",
            )),
        }
    }
}

#[derive(Default)]
struct Tally {
    wins: u64,
    games: u64,
}

pub struct StatsReporter {
    store: Arc<dyn RecordStore>,
}

impl StatsReporter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Users by wins descending, then user id
    pub async fn top_players(&self, limit: usize) -> StoreResult<Vec<PlayerStanding>> {
        let rounds = self.store.completed_rounds(RoundQuery::all()).await?;

        let mut tallies: HashMap<UserId, Tally> = HashMap::new();
        for participant in rounds.iter().flat_map(|r| r.participants.iter()) {
            let tally = tallies.entry(participant.user_id.clone()).or_default();
            tally.games += 1;
            if participant.is_winner {
                tally.wins += 1;
            }
        }

        let mut standings: Vec<PlayerStanding> = tallies
            .into_iter()
            .map(|(user_id, tally)| PlayerStanding {
                user_id,
                wins: tally.wins,
                total_games: tally.games,
            })
            .collect();
        standings.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.user_id.cmp(&b.user_id)));
        standings.truncate(limit);
        Ok(standings)
    }

    /// Completed rounds started within `[start, end]`, newest first, seated participants only
    pub async fn rounds_by_date(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<RoundSnapshot>> {
        let query = RoundQuery {
            started_after: start,
            started_before: end,
        };
        let mut rounds = self.store.completed_rounds(query).await?;
        for round in &mut rounds {
            round.participants.retain(|p| p.is_active());
        }
        Ok(rounds)
    }

    /// Most wins within the window containing `now`
    pub async fn top_winners_by_period(
        &self,
        period: Period,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<PeriodWinner>> {
        let rounds = self
            .store
            .completed_rounds(RoundQuery::since(period.start(now)))
            .await?;

        let mut wins: HashMap<UserId, u64> = HashMap::new();
        for winner in rounds.iter().flat_map(|r| r.winners()) {
            *wins.entry(winner.user_id.clone()).or_default() += 1;
        }

        let mut winners: Vec<PeriodWinner> = wins
            .into_iter()
            .map(|(user_id, wins)| PeriodWinner { user_id, wins })
            .collect();
        winners.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.user_id.cmp(&b.user_id)));
        winners.truncate(PERIOD_WINNERS_LIMIT);
        Ok(winners)
    }

    /// All zeros for a user with no completed games
    pub async fn user_stats(&self, user_id: &UserId) -> StoreResult<UserStats> {
        let rounds = self.store.completed_rounds(RoundQuery::all()).await?;

        let mut tally = Tally::default();
        for participant in rounds
            .iter()
            .flat_map(|r| r.participants.iter())
            .filter(|p| &p.user_id == user_id)
        {
            tally.games += 1;
            if participant.is_winner {
                tally.wins += 1;
            }
        }

        let win_rate = if tally.games > 0 {
            ((tally.wins as f64 / tally.games as f64) * 100.0).round() as u32
        } else {
            0
        };
        Ok(UserStats {
            total_wins: tally.wins,
            total_losses: tally.games - tally.wins,
            total_games: tally.games,
            win_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::types::{NewParticipant, NewRound, ParticipantUpdate},
        store::MemoryRecordStore,
    };

    /// Completed round started at `started_at`: (user, pick, queued)
    async fn play(
        store: &MemoryRecordStore,
        started_at: DateTime<Utc>,
        entries: &[(&str, Option<u8>, bool)],
        winning_number: u8,
    ) {
        let round = store
            .create_round(NewRound {
                started_at,
                ends_at: started_at + Duration::seconds(20),
                started_by: None,
            })
            .await
            .unwrap();
        for (i, (user, pick, queued)) in entries.iter().enumerate() {
            let participant = store
                .create_participant(NewParticipant {
                    round_id: round.id,
                    user_id: UserId::from(*user),
                    joined_at: started_at + Duration::milliseconds(i as i64),
                    in_queue: *queued,
                })
                .await
                .unwrap();
            if let Some(n) = pick {
                store
                    .update_participant(participant.id, ParticipantUpdate::choose(*n))
                    .await
                    .unwrap();
            }
        }
        store.complete_round(round.id, winning_number).await.unwrap();
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_period_start() {
        // 2024-05-15 is a Wednesday
        let now = at(2024, 5, 15, 13);
        assert_eq!(Period::Day.start(now), at(2024, 5, 15, 0));
        assert_eq!(Period::Week.start(now), at(2024, 5, 12, 0));
        assert_eq!(Period::Month.start(now), at(2024, 5, 1, 0));

        let sunday = at(2024, 5, 12, 8);
        assert_eq!(Period::Week.start(sunday), at(2024, 5, 12, 0));
        assert!("fortnight".parse::<Period>().is_err());
        assert_eq!("Week".parse::<Period>().unwrap(), Period::Week);
    }

    #[tokio::test]
    async fn test_top_players_and_user_stats() {
        let store = Arc::new(MemoryRecordStore::new());
        play(&store, at(2024, 5, 1, 10), &[("ann", Some(3), false), ("bob", Some(4), false)], 3).await;
        play(&store, at(2024, 5, 2, 10), &[("ann", Some(3), false), ("bob", Some(3), false)], 3).await;
        play(&store, at(2024, 5, 3, 10), &[("ann", Some(1), false), ("cat", None, true)], 1).await;

        let reporter = StatsReporter::new(store);
        let top = reporter.top_players(DEFAULT_TOP_LIMIT).await.unwrap();
        let rows: Vec<(&str, u64, u64)> = top
            .iter()
            .map(|s| (s.user_id.as_str(), s.wins, s.total_games))
            .collect();
        assert_eq!(rows, vec![("ann", 3, 3), ("bob", 1, 2), ("cat", 0, 1)]);
        assert_eq!(reporter.top_players(1).await.unwrap().len(), 1);

        let bob = reporter.user_stats(&UserId::from("bob")).await.unwrap();
        assert_eq!(bob, UserStats { total_wins: 1, total_losses: 1, total_games: 2, win_rate: 50 });

        let unknown = reporter.user_stats(&UserId::from("nobody")).await.unwrap();
        assert_eq!(unknown, UserStats::default());
    }

    #[tokio::test]
    async fn test_win_rate_rounds() {
        let store = Arc::new(MemoryRecordStore::new());
        play(&store, at(2024, 5, 1, 10), &[("ann", Some(2), false)], 2).await;
        play(&store, at(2024, 5, 2, 10), &[("ann", Some(2), false)], 9).await;
        play(&store, at(2024, 5, 3, 10), &[("ann", Some(2), false)], 9).await;

        let stats = StatsReporter::new(store)
            .user_stats(&UserId::from("ann"))
            .await
            .unwrap();
        assert_eq!(stats.win_rate, 33);
    }

    #[tokio::test]
    async fn test_rounds_by_date_hides_queue() {
        let store = Arc::new(MemoryRecordStore::new());
        play(&store, at(2024, 5, 1, 10), &[("ann", Some(1), false)], 1).await;
        play(&store, at(2024, 5, 2, 10), &[("ann", Some(1), false), ("cat", None, true)], 2).await;
        play(&store, at(2024, 5, 3, 10), &[("bob", Some(1), false)], 1).await;

        let reporter = StatsReporter::new(store);
        let rounds = reporter
            .rounds_by_date(Some(at(2024, 5, 2, 0)), Some(at(2024, 5, 3, 10)))
            .await
            .unwrap();
        assert_eq!(rounds.len(), 2);
        assert_eq!(rounds[0].round.started_at, at(2024, 5, 3, 10));
        assert!(rounds.iter().all(|r| r.participants.iter().all(|p| p.is_active())));
        assert_eq!(rounds[1].participants.len(), 1);
    }

    #[tokio::test]
    async fn test_top_winners_by_period() {
        let store = Arc::new(MemoryRecordStore::new());
        play(&store, at(2024, 4, 30, 10), &[("old", Some(1), false)], 1).await;
        play(&store, at(2024, 5, 13, 10), &[("ann", Some(1), false)], 1).await;
        play(&store, at(2024, 5, 15, 9), &[("ann", Some(5), false), ("bob", Some(5), false)], 5).await;

        let reporter = StatsReporter::new(store);
        let now = at(2024, 5, 15, 13);

        let day = reporter.top_winners_by_period(Period::Day, now).await.unwrap();
        assert_eq!(day.len(), 2);

        let week = reporter.top_winners_by_period(Period::Week, now).await.unwrap();
        assert_eq!(week[0], PeriodWinner { user_id: UserId::from("ann"), wins: 2 });

        let month = reporter.top_winners_by_period(Period::Month, now).await.unwrap();
        assert!(month.iter().all(|w| w.user_id.as_str() != "old"));
    }
}
