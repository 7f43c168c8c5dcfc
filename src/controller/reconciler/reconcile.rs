//! # Reconcile
//!
//! One reconciliation pass for a Secret: evaluate, act, and schedule the next check.

use crate::controller::policy::next_check_in;
use crate::controller::reconciler::evaluate::{evaluate_at, Evaluation};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError, SecretKey, TriggerSource};
use crate::observability;
use chrono::Utc;
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};

/// Reconcile one Secret
///
/// Regeneration failures are returned as errors so the error policy can
/// retry the key with backoff. Every other outcome is final for this pass.
///
/// # Errors
///
/// Returns [`ReconcilerError`] when the object has no key or the regeneration
/// delete fails.
pub async fn reconcile(secret: Arc<Secret>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let key = SecretKey::from_secret(&secret)?;
    let span = info_span!(
        "controller.reconcile",
        secret.namespace = %key.namespace,
        secret.name = %key.name
    );

    async move {
        let start = Instant::now();
        observability::metrics::increment_reconciliations();

        let result = reconcile_key(&key, &ctx).await;

        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if result.is_ok() {
            ctx.reset_backoff(&key);
        }
        result
    }
    .instrument(span)
    .await
}

async fn reconcile_key(key: &SecretKey, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let min_time_left = ctx.config.read().await.min_time_left;
    let now = Utc::now();

    match evaluate_at(ctx.cache.as_ref(), key, min_time_left, now) {
        Evaluation::Gone => Ok(Action::await_change()),
        Evaluation::Unmanaged => {
            observability::metrics::increment_unmanaged_secrets();
            Ok(Action::await_change())
        }
        Evaluation::Keep { secret, service } => {
            let Some(due_in) = next_check_in(&secret, min_time_left, now) else {
                return Ok(Action::await_change());
            };
            debug!(
                service.name = service.metadata.name.as_deref().unwrap_or_default(),
                due_in_secs = due_in.as_secs(),
                "Certificate is current, scheduling next check"
            );
            observability::metrics::increment_requeues_total(TriggerSource::ExpiryTimer.as_str());
            Ok(Action::requeue(due_in))
        }
        Evaluation::Regenerate {
            secret,
            service,
            reason,
        } => {
            info!(
                service.name = service.metadata.name.as_deref().unwrap_or_default(),
                reason = %reason,
                "Regenerating serving certificate"
            );
            ctx.regenerator
                .regenerate(&key.namespace, &key.name, secret.metadata.uid.as_deref())
                .await
                .map_err(|source| ReconcilerError::Regeneration {
                    namespace: key.namespace.clone(),
                    name: key.name.clone(),
                    source,
                })?;
            observability::metrics::increment_regenerations(reason.as_str());
            Ok(Action::await_change())
        }
    }
}
