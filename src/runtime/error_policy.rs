//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::config::ControllerConfig;
use crate::controller::backoff::BackoffState;
use crate::controller::reconciler::{Reconciler, ReconcilerError, SecretKey, TriggerSource};
use crate::observability;
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle reconciliation errors with bounded exponential backoff
///
/// Backoff state is tracked per secret so one failing key never slows down
/// the others. Once a key has used up `max_retries` it is left alone until
/// its next change event.
pub fn handle_reconciliation_error(
    obj: Arc<Secret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        secret.name = name,
        secret.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    warn!("Reconciliation error for {}/{}: {:?}", namespace, name, error);
    observability::metrics::increment_reconciliation_errors();

    // The config lock is async; a writer mid-reload falls back to defaults for this one retry
    let config = ctx
        .config
        .try_read()
        .map_or_else(|_| ControllerConfig::default(), |c| c.clone());

    let resource_key = format!("{namespace}/{name}");
    let decision = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key.clone()).or_insert_with(|| {
                BackoffState::new(config.backoff_start_duration(), config.backoff_max_duration())
            });
            next_retry(state, config.max_retries)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            RetryDecision::Retry {
                delay: config.backoff_start_duration(),
                attempt: 0,
            }
        }
    };

    match decision {
        RetryDecision::Retry { delay, attempt } => {
            info!(
                "Retrying {} in {}ms (attempt {} of {}, trigger source: error-backoff)",
                resource_key,
                delay.as_millis(),
                attempt,
                config.max_retries
            );
            observability::metrics::increment_requeues_total(TriggerSource::ErrorBackoff.as_str());
            Action::requeue(delay)
        }
        RetryDecision::GiveUp { attempts } => {
            error!(
                "Giving up on {} after {} failed attempts; waiting for the next change",
                resource_key, attempts
            );
            observability::metrics::increment_retries_exhausted();
            if let Ok(mut states) = ctx.backoff_states.lock() {
                states.remove(&resource_key);
            }
            Action::await_change()
        }
    }
}

/// Drop the retry history of a Secret that left the store
///
/// A retry scheduled for a deleted Secret never reaches `reconcile`, so its
/// backoff entry would otherwise stay in the table for good.
pub fn forget_deleted_secret(ctx: &Reconciler, namespace: Option<&str>, name: &str) {
    ctx.reset_backoff(&SecretKey::new(namespace.unwrap_or("default"), name));
}

/// Outcome of recording one more failure against a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration, attempt: u32 },
    GiveUp { attempts: u32 },
}

/// Record a failure and decide whether to retry
#[must_use]
pub fn next_retry(state: &mut BackoffState, max_retries: u32) -> RetryDecision {
    state.increment_error();
    if state.exhausted(max_retries) {
        RetryDecision::GiveUp {
            attempts: state.error_count,
        }
    } else {
        RetryDecision::Retry {
            delay: state.backoff.next_backoff(),
            attempt: state.error_count,
        }
    }
}

/// Watch stream failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    NotFound,
    Unauthorized,
    Forbidden,
    ResourceVersionExpired,
    TooManyRequests,
    Other,
}

/// Classify a watch error from its debug rendering
///
/// 404 is checked before 401 because a plain-text 404 body surfaces as a
/// decode error whose chain also mentions the watch failure.
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");

    if is_not_found {
        WatchErrorKind::NotFound
    } else if error_string.contains("401") || error_string.contains("Unauthorized") {
        WatchErrorKind::Unauthorized
    } else if error_string.contains("403") || error_string.contains("Forbidden") {
        WatchErrorKind::Forbidden
    } else if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        WatchErrorKind::ResourceVersionExpired
    } else if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        WatchErrorKind::TooManyRequests
    } else {
        WatchErrorKind::Other
    }
}

/// Handle watch stream errors with appropriate classification and backoff
///
/// The reflectors already retry with their own backoff; this only logs with
/// the right severity and slows the stream down for auth and throttling errors.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    match classify_watch_error(error_string) {
        WatchErrorKind::Unauthorized | WatchErrorKind::Forbidden => {
            error!("Watch on Secrets/Services was rejected (401/403) - RBAC may have been revoked or the token expired");
            error!("🔍 SRE Diagnostics:");
            error!("   1. Verify the ClusterRole grants get/list/watch on secrets and services and delete on secrets:");
            error!("      kubectl get clusterrole serving-cert-controller -o yaml");
            error!("   2. Verify the ClusterRoleBinding still binds the ServiceAccount:");
            error!("      kubectl get clusterrolebinding serving-cert-controller -o yaml");
            error!("   3. Check the permissions are active:");
            error!("      kubectl auth can-i watch secrets --as=system:serviceaccount:<namespace>:serving-cert-controller --all-namespaces");
            warn!(
                "⏳ Waiting {}s before resuming the watch (RBAC may need time to propagate)...",
                watch_restart_delay_secs
            );
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
        }
        WatchErrorKind::ResourceVersionExpired => {
            warn!("Watch resource version expired (410) - this is normal during pod restarts, watch will relist");
        }
        WatchErrorKind::TooManyRequests => {
            let current_backoff = backoff.load(Ordering::Relaxed);
            warn!(
                "API server throttling or reinitializing storage (429), backing off for {}ms...",
                current_backoff
            );
            tokio::time::sleep(Duration::from_millis(current_backoff)).await;
            let new_backoff = current_backoff.saturating_mul(2).min(max_backoff_ms);
            backoff.store(new_backoff, Ordering::Relaxed);
        }
        WatchErrorKind::NotFound => {
            warn!("Watched object not found (404): {}", error_string);
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
        }
    }
}
