//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `serving_cert_reconciliations_total` - Total number of reconciliations
//! - `serving_cert_reconciliation_errors_total` - Total number of reconciliation errors
//! - `serving_cert_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `serving_cert_regenerations_total` - Secrets deleted for regeneration, by reason
//! - `serving_cert_unmanaged_secrets_total` - Secrets skipped as not bound to a service
//! - `serving_cert_retries_exhausted_total` - Keys dropped after exceeding the retry budget
//! - `serving_cert_requeues_total` - Requeues, by trigger

use anyhow::Result;
use prometheus::core::Collector;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "serving_cert_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "serving_cert_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "serving_cert_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REGENERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "serving_cert_regenerations_total",
            "Total number of serving-cert secrets deleted for regeneration by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REGENERATIONS_TOTAL metric - this should never happen")
});

static UNMANAGED_SECRETS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "serving_cert_unmanaged_secrets_total",
        "Total number of secrets skipped because no owning service was resolved",
    )
    .expect("Failed to create UNMANAGED_SECRETS_TOTAL metric - this should never happen")
});

static RETRIES_EXHAUSTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "serving_cert_retries_exhausted_total",
        "Total number of secrets dropped after exceeding the retry budget",
    )
    .expect("Failed to create RETRIES_EXHAUSTED_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "serving_cert_requeues_total",
            "Total number of requeues by trigger",
        ),
        &["trigger"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

fn register(collector: Box<dyn Collector>) -> Result<()> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Register all controller metrics with the registry served on `/metrics`
///
/// # Errors
///
/// Returns an error if a metric collides with a differently-shaped one.
pub fn register_metrics() -> Result<()> {
    register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    register(Box::new(RECONCILIATION_DURATION.clone()))?;
    register(Box::new(REGENERATIONS_TOTAL.clone()))?;
    register(Box::new(UNMANAGED_SECRETS_TOTAL.clone()))?;
    register(Box::new(RETRIES_EXHAUSTED_TOTAL.clone()))?;
    register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_regenerations(reason: &str) {
    REGENERATIONS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_unmanaged_secrets() {
    UNMANAGED_SECRETS_TOTAL.inc();
}

pub fn increment_retries_exhausted() {
    RETRIES_EXHAUSTED_TOTAL.inc();
}

pub fn increment_requeues_total(trigger: &str) {
    REQUEUES_TOTAL.with_label_values(&[trigger]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_is_repeatable() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.get();
        increment_reconciliations();
        assert!(RECONCILIATIONS_TOTAL.get() > before);
    }

    #[test]
    fn test_increment_regenerations_by_reason() {
        let before = REGENERATIONS_TOTAL.with_label_values(&["expiring"]).get();
        increment_regenerations("expiring");
        let after = REGENERATIONS_TOTAL.with_label_values(&["expiring"]).get();
        assert!(after > before);
    }

    #[test]
    fn test_increment_requeues_by_trigger() {
        let before = REQUEUES_TOTAL.with_label_values(&["error-backoff"]).get();
        increment_requeues_total("error-backoff");
        assert!(REQUEUES_TOTAL.with_label_values(&["error-backoff"]).get() > before);
    }

    #[test]
    fn test_observe_reconciliation_duration() {
        observe_reconciliation_duration(0.25);
    }
}
