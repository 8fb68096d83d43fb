//! Lucky Nine - timed multiplayer number-picking rounds
//!
//! Players join a round that is open for a fixed duration, pick a number from
//! 1 to 9, and win if their pick matches the number drawn when the round
//! completes. Seats are limited; overflow waits in a FIFO queue and moves up
//! only when a seated player leaves.

pub mod api;
pub mod config;
pub mod errors;
pub mod game;
pub mod metrics;
pub mod stats;
pub mod store;

pub use config::{AppConfig, ConfigLoader, GameConfig};
pub use errors::{ConfigurationError, GameError, GameResult, ServiceError, ServiceResult, StoreError, StoreResult};
pub use game::{RoundCoordinator, RoundScheduler};
pub use metrics::GameMetrics;
pub use stats::StatsReporter;
pub use store::{MemoryRecordStore, RecordStore, RocksRecordStore, TimeoutStore};
