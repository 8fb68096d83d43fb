//! Coordinator and stats over the RocksDB record store

use luckynine::{
    config::GameConfig,
    game::{draw::FixedDraw, types::UserId, RoundCoordinator},
    stats::StatsReporter,
    store::{RecordStore, RocksRecordStore},
};
use std::sync::Arc;
use tempfile::TempDir;

fn coordinator(store: Arc<RocksRecordStore>, draw: u8) -> RoundCoordinator {
    RoundCoordinator::builder(store)
        .config(GameConfig {
            max_active_participants: 2,
            ..GameConfig::default()
        })
        .draw(Arc::new(FixedDraw(draw)))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_open_round_survives_restart() {
    let temp_dir = TempDir::new().unwrap();

    let round_id = {
        let store = Arc::new(RocksRecordStore::open(temp_dir.path()).unwrap());
        let game = coordinator(store, 1);
        game.join_round(UserId::from("ann")).await.unwrap();
        game.join_round(UserId::from("bob")).await.unwrap();
        game.join_round(UserId::from("cat")).await.unwrap();
        game.choose_number(UserId::from("ann"), 6).await.unwrap();
        game.get_status().await.unwrap().round_id.unwrap()
    };

    let store = Arc::new(RocksRecordStore::open(temp_dir.path()).unwrap());
    let game = coordinator(store, 6);

    let status = game.get_status().await.unwrap();
    assert_eq!(status.round_id, Some(round_id));
    assert_eq!((status.participant_count, status.queue_count), (2, 1));

    let outcome = game.complete_round(round_id).await.unwrap();
    let winners: Vec<&str> = outcome.winners.iter().map(|p| p.user_id.as_str()).collect();
    assert_eq!(winners, vec!["ann"]);
}

#[tokio::test]
async fn test_leave_promotes_on_rocks() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(RocksRecordStore::open(temp_dir.path()).unwrap());
    let game = coordinator(store.clone(), 3);

    for name in ["a", "b", "c", "d"] {
        game.join_round(UserId::from(name)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    let outcome = game.leave_round(UserId::from("a")).await.unwrap();
    assert_eq!(outcome.promoted.unwrap().user_id.as_str(), "c");

    let snapshot = store.find_open_round().await.unwrap().unwrap();
    let queued: Vec<&str> = snapshot
        .participants
        .iter()
        .filter(|p| p.in_queue)
        .map(|p| p.user_id.as_str())
        .collect();
    assert_eq!(queued, vec!["d"]);
}

#[tokio::test]
async fn test_stats_over_rocks() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(RocksRecordStore::open(temp_dir.path()).unwrap());
    let game = coordinator(store.clone(), 4);

    for _ in 0..3 {
        game.join_round(UserId::from("ann")).await.unwrap();
        game.join_round(UserId::from("bob")).await.unwrap();
        game.choose_number(UserId::from("ann"), 4).await.unwrap();
        game.choose_number(UserId::from("bob"), 9).await.unwrap();
        let round_id = game.get_status().await.unwrap().round_id.unwrap();
        game.complete_round(round_id).await.unwrap();
    }

    let stats = StatsReporter::new(store);
    let top = stats.top_players(10).await.unwrap();
    assert_eq!(top[0].user_id.as_str(), "ann");
    assert_eq!((top[0].wins, top[0].total_games), (3, 3));

    let bob = stats.user_stats(&UserId::from("bob")).await.unwrap();
    assert_eq!((bob.total_wins, bob.total_losses, bob.win_rate), (0, 3, 0));

    let rounds = stats.rounds_by_date(None, None).await.unwrap();
    assert_eq!(rounds.len(), 3);
    assert!(rounds.windows(2).all(|w| w[0].round.started_at >= w[1].round.started_at));
}
