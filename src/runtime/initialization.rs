//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{SharedControllerConfig, SharedServerConfig};
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Shared controller configuration (hot-reloadable)
    pub controller_config: SharedControllerConfig,
    /// Shared server configuration
    pub server_config: SharedServerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
///
/// # Errors
///
/// Fails when metrics cannot be registered, the HTTP server does not come up
/// in time, or no Kubernetes configuration can be inferred.
pub async fn initialize(
    controller_config: SharedControllerConfig,
    server_config: SharedServerConfig,
) -> Result<InitializationResult> {
    // Must happen before any client is built; a second install is harmless
    let crypto_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    let log_level = controller_config.read().await.log_level.to_lowercase();
    init_tracing(&log_level);

    if !crypto_installed {
        info!("rustls crypto provider was already installed");
    }

    info!("Starting Serving Certificate Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    {
        let config = controller_config.read().await;
        info!(
            min_time_left_secs = config.min_time_left.as_secs(),
            max_retries = config.max_retries,
            max_concurrent_reconciliations = config.max_concurrent_reconciliations,
            watch_namespace = config.watch_namespace.as_deref().unwrap_or("*"),
            "Controller configuration loaded"
        );
    }

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());

    let server_port = server_config.read().await.metrics_port;
    let server_state_clone = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        server_state,
        controller_config,
        server_config,
    })
}

/// Install the fmt subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("serving_cert_controller={log_level}")));

    // Tests and embedders may have installed a subscriber already
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &SharedServerConfig,
) -> Result<()> {
    let (startup_timeout, poll_interval) = {
        let config = server_config.read().await;
        (config.startup_timeout(), config.poll_interval())
    };
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
