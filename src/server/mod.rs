// SafeHarbor - Assessment Server Module
// HTTP daemon mode for multi-session risk assessment

mod handlers;

pub use handlers::{create_router, health_check, metrics_endpoint, AppError};

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::engine::SafetyEngine;
use crate::metrics::EngineMetrics;
use crate::responder::Responder;

/// Main assessment server structure
pub struct SafetyServer {
    /// Assessment pipeline (shared across sessions)
    engine: Arc<SafetyEngine>,
    /// Reply generator for /v1/chat
    responder: Arc<dyn Responder>,
    /// Prometheus metrics
    metrics: EngineMetrics,
    /// Server configuration
    config: ServerConfig,
    started_at: Instant,
}

impl SafetyServer {
    /// Create a new assessment server
    pub fn new(
        engine: Arc<SafetyEngine>,
        responder: Arc<dyn Responder>,
        config: ServerConfig,
    ) -> Result<Self> {
        let metrics = EngineMetrics::new().context("Failed to register metrics")?;

        Ok(Self {
            engine,
            responder,
            metrics,
            config,
            started_at: Instant::now(),
        })
    }

    /// Start the HTTP server and the background session cleanup task
    pub async fn serve(self) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address {}", self.config.bind_address))?;

        let store = Arc::clone(self.engine.store());
        let interval = store.config().cleanup_interval();
        let cleanup = store.spawn_cleanup(interval);

        let app = create_router(Arc::new(self)).layer(TraceLayer::new_for_http());

        tracing::info!("Starting SafeHarbor server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        cleanup.abort();
        tracing::info!("Server stopped");
        Ok(())
    }

    pub fn engine(&self) -> &Arc<SafetyEngine> {
        &self.engine
    }

    pub fn responder(&self) -> &Arc<dyn Responder> {
        &self.responder
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
