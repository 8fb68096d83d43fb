//! Lucky Nine game server binary

use clap::Parser;
use luckynine::{
    api::{ApiServer, AppState},
    config::{ConfigLoader, StorageBackend},
    store::{open_store, TimeoutStore},
    GameMetrics, RoundCoordinator, RoundScheduler, ServiceResult, StatsReporter,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "luckynine")]
#[command(about = "Lucky Nine timed number-picking game server", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// API server host
    #[arg(long)]
    host: Option<String>,

    /// API server port
    #[arg(long)]
    port: Option<u16>,

    /// Record store backend (memory or rocksdb)
    #[arg(long)]
    storage: Option<StorageBackend>,

    /// RocksDB data directory
    #[arg(long)]
    data_dir: Option<String>,

    /// Round duration in seconds
    #[arg(long)]
    round_duration: Option<u64>,

    /// Seats per round before joins are queued
    #[arg(long)]
    max_players: Option<usize>,

    /// Do not complete expired rounds in the background
    #[arg(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> ServiceResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "luckynine=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let loader = match args.config {
        Some(ref path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;

    // Command-line flags win over file and environment
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(backend) = args.storage {
        config.storage.backend = backend;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(secs) = args.round_duration {
        config.game.round_duration_secs = secs;
    }
    if let Some(max_players) = args.max_players {
        config.game.max_active_participants = max_players;
    }
    if args.no_scheduler {
        config.scheduler.enabled = false;
    }
    loader.validate(&config)?;

    info!(
        round_duration_secs = config.game.round_duration_secs,
        max_active_participants = config.game.max_active_participants,
        storage = %config.storage.backend,
        "starting Lucky Nine"
    );

    let store = open_store(&config.storage)?;
    let metrics = Arc::new(GameMetrics::new());
    let coordinator = Arc::new(
        RoundCoordinator::builder(store.clone())
            .config(config.game.clone())
            .metrics(metrics)
            .build()?,
    );
    let stats = StatsReporter::new(Arc::new(TimeoutStore::new(store, config.game.store_timeout())));

    let scheduler = config
        .scheduler
        .enabled
        .then(|| RoundScheduler::spawn(coordinator.clone(), config.scheduler.tick()));

    let state = Arc::new(AppState::new(coordinator, stats));
    let result = ApiServer::new(config.server.clone(), state).run().await;

    if let Some(scheduler) = scheduler {
        scheduler.stop();
    }
    result
}
