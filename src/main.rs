//! # Serving Certificate Controller
//!
//! A Kubernetes controller that keeps service serving-certificate Secrets
//! trustworthy.
//!
//! ## Overview
//!
//! For every Secret that names an originating Service the controller:
//!
//! 1. **Resolves the binding** - finds the Service the Secret answers for
//! 2. **Checks validity** - the Service must point back at this Secret, under the UID the Secret records
//! 3. **Applies the expiry policy** - missing, malformed or soon-expiring certificates are rotated
//! 4. **Regenerates** - deletes the Secret so the signer recreates it with fresh material
//!
//! Service events re-enqueue the Secrets bound to them, so a Service recreated
//! under a new UID invalidates its old certificate promptly.
//!
//! ## Usage
//!
//! ```bash
//! serving-cert-controller --min-time-left 2h --namespace my-namespace
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use serving_cert_controller::config::{
    into_shared, load_config, parse_duration, start_configmap_watch, ConfigOverrides,
};
use serving_cert_controller::runtime::initialization::initialize;
use serving_cert_controller::runtime::watch_loop::run_watch_loop;
use tracing::info;

/// Serving Certificate Controller
#[derive(Parser, Debug)]
#[command(name = "serving-cert-controller", version, about, long_about = None)]
struct Cli {
    /// Regenerate certificates this long before they expire (e.g. "30m", "1h", "1d").
    /// Secrets already holding both tls.crt and tls.key are kept until actual expiry.
    /// Overrides MIN_TIME_LEFT, including values from a hot-reloaded ConfigMap
    #[arg(long)]
    min_time_left: Option<String>,

    /// Port for /metrics, /healthz and /readyz (overrides METRICS_PORT)
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Only watch this namespace (overrides WATCH_NAMESPACE; default: all namespaces)
    #[arg(long)]
    namespace: Option<String>,

    /// ConfigMap to watch for configuration hot-reload
    #[arg(long, env = "CONFIG_MAP_NAME")]
    config_map: Option<String>,

    /// Namespace of the hot-reload ConfigMap
    #[arg(long, env = "POD_NAMESPACE", default_value = "openshift-service-ca")]
    controller_namespace: String,
}

impl Cli {
    fn overrides(&self) -> Result<ConfigOverrides> {
        let min_time_left = self
            .min_time_left
            .as_deref()
            .map(parse_duration)
            .transpose()
            .context("Invalid --min-time-left")?;
        Ok(ConfigOverrides {
            min_time_left,
            watch_namespace: self.namespace.clone().filter(|ns| !ns.trim().is_empty()),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = cli.overrides()?;

    let (mut controller_config, mut server_config) = load_config();
    overrides.apply(&mut controller_config);
    if let Some(port) = cli.metrics_port {
        server_config.metrics_port = port;
    }
    let (controller_config, server_config) = into_shared(controller_config, server_config);

    let init = initialize(controller_config, server_config).await?;

    if let Some(config_map) = cli.config_map.as_deref() {
        info!(
            "Hot-reload enabled: watching ConfigMap '{}' in namespace '{}'",
            config_map, cli.controller_namespace
        );
        start_configmap_watch(
            init.client.clone(),
            &cli.controller_namespace,
            config_map,
            std::sync::Arc::clone(&init.controller_config),
            overrides,
        );
    } else {
        info!("Hot-reload disabled - configuration changes require pod restart");
    }

    run_watch_loop(init.client, init.server_state, init.controller_config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "serving-cert-controller",
            "--min-time-left",
            "30m",
            "--namespace",
            "ns1",
        ]);
        let overrides = cli.overrides().unwrap();
        assert_eq!(overrides.min_time_left, Some(Duration::from_secs(1800)));
        assert_eq!(overrides.watch_namespace.as_deref(), Some("ns1"));
    }

    #[test]
    fn test_cli_rejects_bad_lead_time() {
        let cli = Cli::parse_from(["serving-cert-controller", "--min-time-left", "soon"]);
        assert!(cli.overrides().is_err());
    }
}
