//! # ConfigMap Watch
//!
//! Watches the controller's ConfigMap and hot-reloads [`ControllerConfig`].
//!
//! Only controller settings are reloaded. The metrics server keeps the port it
//! bound at startup.

use crate::config::{ConfigOverrides, ControllerConfig, SharedControllerConfig};
use futures::{pin_mut, StreamExt};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Api;
use kube_runtime::watcher;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Start watching for ConfigMap changes and hot-reload configuration
///
/// Watches the named ConfigMap in the controller namespace. Each change rebuilds
/// the configuration from the ConfigMap data, falling back to environment
/// variables for keys it does not set, then re-applies command-line overrides.
pub fn start_configmap_watch(
    client: kube::Client,
    namespace: &str,
    configmap_name: &str,
    controller_config: SharedControllerConfig,
    overrides: ConfigOverrides,
) {
    let namespace = namespace.to_string();
    let configmap_name = configmap_name.to_string();
    tokio::spawn(async move {
        let configmaps: Api<ConfigMap> = Api::namespaced(client, &namespace);

        info!(
            "Starting watch for ConfigMap '{}' in namespace '{}'",
            configmap_name, namespace
        );

        let watcher_config =
            watcher::Config::default().fields(&format!("metadata.name={configmap_name}"));
        let stream = watcher(configmaps, watcher_config);
        pin_mut!(stream);

        while let Some(event_result) = stream.next().await {
            match event_result {
                Ok(watcher::Event::Apply(configmap)) => {
                    info!("ConfigMap '{}' changed, reloading configuration", configmap_name);
                    let new_config = config_from_configmap(configmap.data.as_ref(), &overrides);
                    store_config(&controller_config, new_config).await;
                }
                Ok(watcher::Event::Delete(_)) => {
                    warn!(
                        "ConfigMap '{}' was deleted, reverting to environment configuration",
                        configmap_name
                    );
                    let new_config = config_from_configmap(None, &overrides);
                    store_config(&controller_config, new_config).await;
                }
                // Startup configuration is already loaded
                Ok(watcher::Event::Init | watcher::Event::InitApply(_) | watcher::Event::InitDone) => {}
                Err(e) => {
                    error!("Error watching ConfigMap: {}", e);
                }
            }
        }

        warn!("ConfigMap watch stream ended");
    });
}

/// Build controller configuration from ConfigMap data
///
/// ConfigMap keys are matched case-insensitively against the environment
/// variable names (`min_time_left` and `MIN_TIME_LEFT` are equivalent).
#[must_use]
pub fn config_from_configmap(
    data: Option<&BTreeMap<String, String>>,
    overrides: &ConfigOverrides,
) -> ControllerConfig {
    let data: BTreeMap<String, String> = data
        .into_iter()
        .flatten()
        .map(|(k, v)| (k.to_uppercase(), v.clone()))
        .collect();
    let mut config = ControllerConfig::from_lookup(|key| {
        data.get(key).cloned().or_else(|| std::env::var(key).ok())
    });
    overrides.apply(&mut config);
    config
}

async fn store_config(shared: &SharedControllerConfig, new_config: ControllerConfig) {
    info!(
        min_time_left_secs = new_config.min_time_left.as_secs(),
        backoff_start_ms = new_config.backoff_start_ms,
        backoff_max_ms = new_config.backoff_max_ms,
        max_retries = new_config.max_retries,
        "Configuration reloaded"
    );
    if new_config.watch_namespace != shared.read().await.watch_namespace {
        warn!("WATCH_NAMESPACE changes take effect on the next watch restart");
    }
    *shared.write().await = new_config;
}
