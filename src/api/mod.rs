//! Lucky Nine HTTP API
//!
//! Player operations, leaderboard queries, a websocket event stream and
//! Prometheus metrics over axum.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod websocket;

pub use handlers::AppState;
pub use server::ApiServer;
