//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables or ConfigMap data.

use super::{lookup_or_default, parse_duration};
use std::time::Duration;
use tracing::warn;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Regeneration lead time
    /// A secret whose certificate expires within this window of "now" is rotated
    /// unless it already holds both `tls.crt` and `tls.key`; populated secrets
    /// are kept until their actual expiry
    pub min_time_left: Duration,
    /// First retry delay after a transient failure (milliseconds)
    pub backoff_start_ms: u64,
    /// Retry delay cap (milliseconds)
    pub backoff_max_ms: u64,
    /// Retries per secret before the key is dropped until its next change event
    pub max_retries: u32,
    /// Maximum concurrent reconciliations
    pub max_concurrent_reconciliations: u16,
    /// Restrict the watch to a single namespace (all namespaces when unset)
    pub watch_namespace: Option<String>,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after the stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::{
            DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_START_MS,
            DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_MAX_RETRIES,
            DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS, DEFAULT_WATCH_RESTART_DELAY_SECS,
        };
        Self {
            min_time_left: default_min_time_left(),
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            watch_namespace: None,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            log_level: "INFO".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (env vars, ConfigMap data)
    ///
    /// Keys are the upper-case environment variable names.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            min_time_left: lookup("MIN_TIME_LEFT")
                .map_or(defaults.min_time_left, |raw| min_time_left_or_default(&raw)),
            backoff_start_ms: lookup_or_default(&lookup, "BACKOFF_START_MS", defaults.backoff_start_ms),
            backoff_max_ms: lookup_or_default(&lookup, "BACKOFF_MAX_MS", defaults.backoff_max_ms),
            max_retries: lookup_or_default(&lookup, "MAX_RETRIES", defaults.max_retries),
            max_concurrent_reconciliations: lookup_or_default(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            watch_namespace: lookup("WATCH_NAMESPACE")
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty()),
            watch_restart_delay_secs: lookup_or_default(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            watch_restart_delay_after_end_secs: lookup_or_default(
                &lookup,
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                defaults.watch_restart_delay_after_end_secs,
            ),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    /// Get backoff start duration
    #[must_use]
    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    /// Get backoff max duration
    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Get watch restart delay after end duration
    #[must_use]
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

/// Command-line overrides, re-applied whenever configuration is reloaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub min_time_left: Option<Duration>,
    pub watch_namespace: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ControllerConfig) {
        if let Some(min_time_left) = self.min_time_left {
            config.min_time_left = min_time_left;
        }
        if let Some(namespace) = &self.watch_namespace {
            config.watch_namespace = Some(namespace.clone());
        }
    }
}

fn default_min_time_left() -> Duration {
    parse_duration(crate::constants::DEFAULT_MIN_TIME_LEFT).unwrap_or(Duration::from_secs(3600))
}

/// Parse a configured lead time, falling back to the default on bad input
pub(crate) fn min_time_left_or_default(raw: &str) -> Duration {
    match parse_duration(raw) {
        Ok(duration) => duration,
        Err(e) => {
            let fallback = default_min_time_left();
            warn!(
                value = raw,
                error = %e,
                "Invalid MIN_TIME_LEFT, using default of {}s",
                fallback.as_secs()
            );
            fallback
        }
    }
}
