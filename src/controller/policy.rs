//! # Regeneration Policy
//!
//! Decides whether a validated serving-cert secret must be replaced.
//!
//! Decision order:
//! 1. Owner reference does not name the service's current UID → regenerate
//! 2. Expiry annotation missing → regenerate
//! 3. Expiry annotation unparsable as RFC3339 → regenerate
//! 4. Expiry at or before now → regenerate
//! 5. Expiry within the lead window (`now < expiry <= now + min_time_left`)
//!    → regenerate, unless the secret already holds both certificate and
//!    key material, in which case it keeps serving until it actually expires
//! 6. Otherwise → keep
//!
//! Every outcome is deterministic given the objects, the lead time and the
//! clock; malformed metadata is never an error.

use crate::constants::{TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use crate::controller::annotations::{secret_expiry, secret_service_name};
use crate::controller::binding::owner_reference_matches;
use chrono::{DateTime, TimeDelta, Utc};
use k8s_openapi::api::core::v1::{Secret, Service};
use std::time::Duration;

/// Why a secret has to be replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegenerationReason {
    /// Service and secret no longer point at each other
    BindingInvalid,
    /// Owner reference names another incarnation of the service
    OwnerMismatch,
    /// No expiry annotation
    MissingExpiry,
    /// Expiry annotation is not a timestamp
    MalformedExpiry,
    /// Certificate is expired or inside the lead window
    Expiring,
}

impl RegenerationReason {
    /// Get human-readable string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RegenerationReason::BindingInvalid => "binding-invalid",
            RegenerationReason::OwnerMismatch => "owner-mismatch",
            RegenerationReason::MissingExpiry => "missing-expiry",
            RegenerationReason::MalformedExpiry => "malformed-expiry",
            RegenerationReason::Expiring => "expiring",
        }
    }
}

impl std::fmt::Display for RegenerationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `secret` must be regenerated, evaluated against the current wall clock
///
/// Only meaningful for pairs that passed
/// [`is_secret_valid_for_service`](crate::controller::validity::is_secret_valid_for_service).
#[must_use]
pub fn needs_regeneration(service: &Service, secret: &Secret, min_time_left: Duration) -> bool {
    regeneration_reason(service, secret, min_time_left, Utc::now()).is_some()
}

/// The reason `secret` must be regenerated at instant `now`, if any
#[must_use]
pub fn regeneration_reason(
    service: &Service,
    secret: &Secret,
    min_time_left: Duration,
    now: DateTime<Utc>,
) -> Option<RegenerationReason> {
    if !owner_reference_matches(secret, service) {
        return Some(RegenerationReason::OwnerMismatch);
    }

    let expiry = match parse_expiry(secret) {
        Expiry::Missing => return Some(RegenerationReason::MissingExpiry),
        Expiry::Malformed => return Some(RegenerationReason::MalformedExpiry),
        Expiry::At(expiry) => expiry,
    };

    if expiry <= rotation_deadline(secret, expiry, min_time_left, now) {
        Some(RegenerationReason::Expiring)
    } else {
        None
    }
}

/// How long until a currently-kept secret becomes due for regeneration
///
/// Returns `None` when the expiry cannot be read or the secret is already
/// due; such secrets are handled by [`regeneration_reason`].
#[must_use]
pub fn next_check_in(secret: &Secret, min_time_left: Duration, now: DateTime<Utc>) -> Option<Duration> {
    let Expiry::At(expiry) = parse_expiry(secret) else {
        return None;
    };

    let due_at = if has_certificate_material(secret) {
        expiry
    } else {
        expiry
            .checked_sub_signed(lead_time(min_time_left))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    };

    (due_at - now).to_std().ok().filter(|d| !d.is_zero())
}

/// Whether the secret holds a non-empty certificate and private key
#[must_use]
pub fn has_certificate_material(secret: &Secret) -> bool {
    let Some(data) = secret.data.as_ref() else {
        return false;
    };
    [TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY]
        .iter()
        .all(|key| data.get(*key).is_some_and(|bytes| !bytes.0.is_empty()))
}

enum Expiry {
    Missing,
    Malformed,
    At(DateTime<Utc>),
}

fn parse_expiry(secret: &Secret) -> Expiry {
    let Some(raw) = secret_service_name(secret)
        .and_then(|(_, generation)| secret_expiry(secret, generation))
    else {
        return Expiry::Missing;
    };

    match DateTime::parse_from_rfc3339(raw) {
        Ok(expiry) => Expiry::At(expiry.with_timezone(&Utc)),
        Err(e) => {
            tracing::info!(
                secret.namespace = secret.metadata.namespace.as_deref().unwrap_or("unknown"),
                secret.name = secret.metadata.name.as_deref().unwrap_or("unknown"),
                expiry = raw,
                error = %e,
                "Unparsable certificate expiry, treating certificate as expired"
            );
            Expiry::Malformed
        }
    }
}

fn lead_time(min_time_left: Duration) -> TimeDelta {
    TimeDelta::from_std(min_time_left).unwrap_or(TimeDelta::MAX)
}

/// The latest expiry that still counts as due at `now`
///
/// Secrets already holding certificate and key material are exempt from the
/// lead window and stay until their actual expiry.
fn rotation_deadline(
    secret: &Secret,
    expiry: DateTime<Utc>,
    min_time_left: Duration,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    if expiry <= now {
        return now;
    }
    let lead_deadline = now
        .checked_add_signed(lead_time(min_time_left))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    if has_certificate_material(secret) {
        // TODO: confirm whether populated secrets should also rotate inside
        // the lead window; today they are kept until actual expiry.
        if expiry <= lead_deadline {
            tracing::debug!(
                secret.namespace = secret.metadata.namespace.as_deref().unwrap_or("unknown"),
                secret.name = secret.metadata.name.as_deref().unwrap_or("unknown"),
                expiry = %expiry,
                "Certificate inside lead window kept until expiry, secret already holds certificate and key"
            );
        }
        return now;
    }
    lead_deadline
}
