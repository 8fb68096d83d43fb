//! API Server
//!
//! Middleware stack and lifecycle for the HTTP/WebSocket surface.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::{
    config::ServerConfig,
    errors::{ServiceError, ServiceResult},
};
use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

pub struct ApiServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> ServiceResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> ServiceResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.create_app();
        let addr = self.socket_addr()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("Lucky Nine API listening on http://{}", addr);
        info!("   CORS: {:?}", self.config.cors_origins);
        info!("   Request timeout: {}s", self.config.request_timeout_secs);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server stopped gracefully");
        Ok(())
    }

    /// Router with the full middleware stack
    pub fn create_app(&self) -> axum::Router {
        create_router(self.state.clone())
            // Request ID middleware (first for tracing)
            .layer(axum::middleware::from_fn(request_id_middleware))
            // CORS before timeout to answer preflight
            .layer(create_cors_layer(self.config.cors_origins.clone()))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    fn socket_addr(&self) -> ServiceResult<SocketAddr> {
        let ip: std::net::IpAddr = self.config.host.parse().map_err(|e| {
            ServiceError::Server(format!("invalid host '{}': {}", self.config.host, e))
        })?;
        Ok(SocketAddr::from((ip, self.config.port)))
    }
}

/// Wait for shutdown signal
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
