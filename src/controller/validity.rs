//! # Validity Checker
//!
//! Verifies a resolved (Service, Secret) pair points at each other.

use crate::controller::annotations::{secret_service_name, secret_service_uid, service_secret_name};
use k8s_openapi::api::core::v1::{Secret, Service};

/// Whether `secret` is still the serving-cert secret of `service`
///
/// The pair is valid when the service declares this secret's name as its
/// serving-cert target and the service UID recorded on the secret (same
/// annotation generation as its service-name) equals the service's current
/// UID. Pure function over already-fetched objects.
#[must_use]
pub fn is_secret_valid_for_service(service: &Service, secret: &Secret) -> bool {
    let Some(secret_name) = secret.metadata.name.as_deref() else {
        return false;
    };
    if service_secret_name(service) != Some(secret_name) {
        return false;
    }

    let Some((service_name, generation)) = secret_service_name(secret) else {
        return false;
    };
    if service.metadata.name.as_deref() != Some(service_name) {
        return false;
    }

    match (
        secret_service_uid(secret, generation),
        service.metadata.uid.as_deref(),
    ) {
        (Some(recorded), Some(current)) => recorded == current,
        _ => false,
    }
}
