//! # Controller Configuration
//!
//! Controller-level configuration loaded from environment variables (populated from ConfigMap).
//!
//! All configuration has sensible defaults and can be overridden via environment variables.
//! Environment variables are populated from a ConfigMap using `envFrom` in the deployment.

mod controller;
mod duration;
mod server;
mod watch;

pub use controller::{ConfigOverrides, ControllerConfig};
pub use duration::parse_duration;
pub use server::ServerConfig;
pub use watch::{config_from_configmap, start_configmap_watch};

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared controller configuration, read by the reconciler on every pass
pub type SharedControllerConfig = Arc<RwLock<ControllerConfig>>;

/// Shared server configuration
pub type SharedServerConfig = Arc<RwLock<ServerConfig>>;

/// Load configuration from environment variables with defaults
#[must_use]
pub fn load_config() -> (ControllerConfig, ServerConfig) {
    (ControllerConfig::from_env(), ServerConfig::from_env())
}

/// Wrap already-loaded configuration in shared handles
#[must_use]
pub fn into_shared(
    controller_config: ControllerConfig,
    server_config: ServerConfig,
) -> (SharedControllerConfig, SharedServerConfig) {
    (
        Arc::new(RwLock::new(controller_config)),
        Arc::new(RwLock::new(server_config)),
    )
}

/// Read a key through `lookup` and parse it, or return the default value
pub(crate) fn lookup_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
