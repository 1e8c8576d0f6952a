//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::AegisConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::pipeline::Pipeline;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Aegis daemon server
pub struct Server {
    config: AegisConfig,
    pipeline: Arc<Pipeline>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: AegisConfig) -> DaemonResult<Self> {
        let pipeline = Pipeline::build(&config)?;
        Ok(Self { config, pipeline })
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.clone()
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(self.pipeline.clone());
        let app = create_router(state, self.config.server.enable_cors);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Aegis daemon listening on {}", addr);
        tracing::info!(
            oracle = self.config.oracle.enabled,
            validators = self.config.validators.len(),
            "Pipeline configuration loaded"
        );

        self.pipeline.start();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Aegis daemon shutting down");

        self.pipeline.shutdown();

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
