//! # Evaluate
//!
//! Runs one secret key through resolve, validate and decide against the cache.
//!
//! Evaluation is a pure function of cache state and the clock: calling it twice
//! on an unchanged cache yields the same outcome.

use crate::controller::binding::resolve_service;
use crate::controller::cache::ObjectCache;
use crate::controller::policy::{regeneration_reason, RegenerationReason};
use crate::controller::reconciler::types::SecretKey;
use crate::controller::validity::is_secret_valid_for_service;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Secret, Service};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What the loop must do with a secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Leave the secret alone
    None,
    /// Delete the secret so the signer recreates it
    Regenerate(RegenerationReason),
}

/// Full outcome of an evaluation, carrying the objects the loop acts on
#[derive(Debug, Clone)]
pub enum Evaluation {
    /// The secret is no longer in the cache
    Gone,
    /// The secret names no service, or the named service does not exist
    Unmanaged,
    /// The secret is valid and current
    Keep {
        secret: Arc<Secret>,
        service: Arc<Service>,
    },
    /// The secret must be replaced
    Regenerate {
        secret: Arc<Secret>,
        service: Arc<Service>,
        reason: RegenerationReason,
    },
}

impl Evaluation {
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Evaluation::Regenerate { reason, .. } => Action::Regenerate(*reason),
            Evaluation::Gone | Evaluation::Unmanaged | Evaluation::Keep { .. } => {
                Action::None
            }
        }
    }
}

/// Decide what to do with the secret at `key`, evaluated now
#[must_use]
pub fn evaluate(cache: &dyn ObjectCache, key: &SecretKey, min_time_left: Duration) -> Action {
    evaluate_at(cache, key, min_time_left, Utc::now()).action()
}

/// Decide what to do with the secret at `key`, evaluated at instant `now`
#[must_use]
pub fn evaluate_at(
    cache: &dyn ObjectCache,
    key: &SecretKey,
    min_time_left: Duration,
    now: DateTime<Utc>,
) -> Evaluation {
    let Some(secret) = cache.get_secret(&key.namespace, &key.name) else {
        debug!(secret = %key, "Secret no longer cached, dropping");
        return Evaluation::Gone;
    };

    let Some(service) = resolve_service(cache, &secret) else {
        debug!(secret = %key, "Secret is not bound to an existing service");
        return Evaluation::Unmanaged;
    };

    if !is_secret_valid_for_service(&service, &secret) {
        return Evaluation::Regenerate {
            secret,
            service,
            reason: RegenerationReason::BindingInvalid,
        };
    }

    match regeneration_reason(&service, &secret, min_time_left, now) {
        Some(reason) => Evaluation::Regenerate {
            secret,
            service,
            reason,
        },
        None => Evaluation::Keep { secret, service },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{
        SERVICE_NAME_ANNOTATION, SERVICE_UID_ANNOTATION, SERVING_CERT_EXPIRY_ANNOTATION,
        SERVING_CERT_SECRET_ANNOTATION,
    };
    use crate::controller::cache::MemoryCache;
    use chrono::TimeDelta;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use std::collections::BTreeMap;

    const HOUR: Duration = Duration::from_secs(3600);

    fn service(uid: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                namespace: Some("ns1".to_string()),
                name: Some("foo".to_string()),
                uid: Some(uid.to_string()),
                annotations: Some(BTreeMap::from([(
                    SERVING_CERT_SECRET_ANNOTATION.to_string(),
                    "mysecret".to_string(),
                )])),
                ..ObjectMeta::default()
            },
            ..Service::default()
        }
    }

    fn secret(uid: &str, expiry: Option<String>) -> Secret {
        let mut annotations = BTreeMap::from([
            (SERVICE_NAME_ANNOTATION.to_string(), "foo".to_string()),
            (SERVICE_UID_ANNOTATION.to_string(), uid.to_string()),
        ]);
        if let Some(expiry) = expiry {
            annotations.insert(SERVING_CERT_EXPIRY_ANNOTATION.to_string(), expiry);
        }
        Secret {
            metadata: ObjectMeta {
                namespace: Some("ns1".to_string()),
                name: Some("mysecret".to_string()),
                annotations: Some(annotations),
                owner_references: Some(vec![OwnerReference {
                    api_version: "v1".to_string(),
                    kind: "Service".to_string(),
                    name: "foo".to_string(),
                    uid: uid.to_string(),
                    ..OwnerReference::default()
                }]),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        }
    }

    fn key() -> SecretKey {
        SecretKey::new("ns1", "mysecret")
    }

    #[test]
    fn test_absent_secret_is_gone() {
        let cache = MemoryCache::new();
        assert!(matches!(
            evaluate_at(&cache, &key(), HOUR, Utc::now()),
            Evaluation::Gone
        ));
    }

    #[test]
    fn test_missing_service_is_unmanaged() {
        let cache = MemoryCache::new();
        cache.add_secret(secret("uid-1", None));
        let evaluation = evaluate_at(&cache, &key(), HOUR, Utc::now());
        assert!(matches!(evaluation, Evaluation::Unmanaged));
        assert_eq!(evaluation.action(), Action::None);
    }

    #[test]
    fn test_uid_drift_forces_binding_invalid() {
        let cache = MemoryCache::new();
        cache.add_service(service("uid-1"));
        let expiry = (Utc::now() + TimeDelta::days(30)).to_rfc3339();
        cache.add_secret(secret("uid-2", Some(expiry)));
        assert_eq!(
            evaluate(&cache, &key(), HOUR),
            Action::Regenerate(RegenerationReason::BindingInvalid)
        );
    }

    #[test]
    fn test_far_expiry_is_kept() {
        let cache = MemoryCache::new();
        cache.add_service(service("uid-1"));
        let expiry = (Utc::now() + TimeDelta::days(30)).to_rfc3339();
        cache.add_secret(secret("uid-1", Some(expiry)));
        assert!(matches!(
            evaluate_at(&cache, &key(), HOUR, Utc::now()),
            Evaluation::Keep { .. }
        ));
    }

    #[test]
    fn test_missing_expiry_regenerates() {
        let cache = MemoryCache::new();
        cache.add_service(service("uid-1"));
        cache.add_secret(secret("uid-1", None));
        assert_eq!(
            evaluate(&cache, &key(), HOUR),
            Action::Regenerate(RegenerationReason::MissingExpiry)
        );
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let cache = MemoryCache::new();
        cache.add_service(service("uid-1"));
        cache.add_secret(secret("uid-1", Some("not-a-time".to_string())));
        let now = Utc::now();
        let first = evaluate_at(&cache, &key(), HOUR, now).action();
        let second = evaluate_at(&cache, &key(), HOUR, now).action();
        assert_eq!(first, second);
        assert_eq!(first, Action::Regenerate(RegenerationReason::MalformedExpiry));
    }
}
