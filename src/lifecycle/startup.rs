//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics
//! - Build the gateway and bind the listener
//! - Run until a termination signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{load_config, ConfigError};
use crate::http::GatewayServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::observability::{logging, metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Start the gateway and block until it has shut down.
pub async fn run(config_path: Option<&Path>) -> Result<(), StartupError> {
    let config = load_config(config_path)?;
    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        "edge-gateway starting"
    );

    let metrics_handle = if config.observability.metrics_enabled {
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let bind_address = config.listener.bind_address.clone();
    let server = GatewayServer::new(config, metrics_handle)?;

    tracing::info!(
        bind_address = %bind_address,
        backends = server.config().backends.len(),
        rate_limit_max = server.config().rate_limit.max_requests,
        rate_limit_window_secs = server.config().rate_limit.window_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    server
        .run(listener, &shutdown)
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
