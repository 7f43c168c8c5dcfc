//! # Binding Resolver
//!
//! Locates the Service a serving-cert Secret belongs to, and in the other
//! direction, the Secrets that may be bound to a Service.
//!
//! Resolution never fails: a secret without a service-name annotation, or
//! whose named service is not in the cache, is simply unmanaged for this pass.

use crate::controller::annotations::{secret_service_name, service_secret_names, GENERATIONS};
use crate::controller::cache::ObjectCache;
use k8s_openapi::api::core::v1::{Secret, Service};
use std::sync::Arc;
use tracing::debug;

/// Find the Service that `secret` declares as its owner
///
/// Looks up the service named by the secret's service-name annotation (current
/// generation first, then legacy) in the secret's own namespace.
///
/// The owner reference is cross-checked but a mismatch does not hide the
/// service: it is still returned so callers can inspect the pair, and the
/// mismatch is re-derived by [`owner_reference_matches`] wherever it matters.
#[must_use]
pub fn resolve_service(cache: &dyn ObjectCache, secret: &Secret) -> Option<Arc<Service>> {
    let (service_name, generation) = secret_service_name(secret)?;
    let namespace = secret.metadata.namespace.as_deref()?;

    let Some(service) = cache.get_service(namespace, service_name) else {
        debug!(
            secret.namespace = namespace,
            secret.name = secret.metadata.name.as_deref().unwrap_or("unknown"),
            service.name = service_name,
            annotations = generation.label,
            "Owning service not found in cache"
        );
        return None;
    };

    if !owner_reference_matches(secret, &service) {
        debug!(
            secret.namespace = namespace,
            secret.name = secret.metadata.name.as_deref().unwrap_or("unknown"),
            service.name = service_name,
            "Secret owner reference does not match the current service identity"
        );
    }

    Some(service)
}

/// Whether the secret carries an owner reference naming this exact service (name and UID)
#[must_use]
pub fn owner_reference_matches(secret: &Secret, service: &Service) -> bool {
    let (Some(name), Some(uid)) = (
        service.metadata.name.as_deref(),
        service.metadata.uid.as_deref(),
    ) else {
        return false;
    };

    secret
        .metadata
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|owner| owner.name == name && owner.uid == uid)
}

/// Keys (name) of the Secrets in the service's namespace that may be bound to it
///
/// Includes the secret names the service declares in either annotation
/// generation, whether cached yet or not, plus every cached secret whose
/// service-name annotation (either generation) names this service. Used to
/// re-enqueue secrets when a service changes, so UID rotation is noticed
/// without waiting for an unrelated secret event.
#[must_use]
pub fn secrets_bound_to_service(cache: &dyn ObjectCache, service: &Service) -> Vec<String> {
    let (Some(namespace), Some(service_name)) = (
        service.metadata.namespace.as_deref(),
        service.metadata.name.as_deref(),
    ) else {
        return Vec::new();
    };

    let mut names: Vec<String> = service_secret_names(service)
        .into_iter()
        .map(str::to_string)
        .collect();

    for secret in cache.list_secrets_in_namespace(namespace) {
        let claims_service = GENERATIONS.iter().any(|generation| {
            secret
                .metadata
                .annotations
                .as_ref()
                .and_then(|annotations| annotations.get(generation.service_name))
                .is_some_and(|name| name == service_name)
        });
        if !claims_service {
            continue;
        }
        if let Some(name) = secret.metadata.name.as_ref() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }

    names
}
