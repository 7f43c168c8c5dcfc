//! # Types
//!
//! Core types for the reconciler.

use crate::config::SharedControllerConfig;
use crate::controller::backoff::BackoffState;
use crate::controller::cache::ObjectCache;
use crate::controller::reconciler::regenerate::SecretRegenerator;
use k8s_openapi::api::core::v1::Secret;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Secret is missing metadata.{0}")]
    MissingObjectKey(&'static str),
    #[error("Failed to regenerate secret {namespace}/{name}: {source}")]
    Regeneration {
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Trigger source for a requeue
/// Recorded on the requeue metric so operators can tell timer traffic from retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Re-check scheduled for when the certificate enters the lead window
    ExpiryTimer,
    /// Retry after a transient failure
    ErrorBackoff,
}

impl TriggerSource {
    /// Get human-readable string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::ExpiryTimer => "expiry-timer",
            TriggerSource::ErrorBackoff => "error-backoff",
        }
    }
}

/// Namespace/name identity of a Secret in the work queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecretKey {
    pub namespace: String,
    pub name: String,
}

impl SecretKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a Secret object
    ///
    /// # Errors
    ///
    /// Returns [`ReconcilerError::MissingObjectKey`] when the object lacks a
    /// namespace or name.
    pub fn from_secret(secret: &Secret) -> Result<Self, ReconcilerError> {
        let namespace = secret
            .metadata
            .namespace
            .as_deref()
            .ok_or(ReconcilerError::MissingObjectKey("namespace"))?;
        let name = secret
            .metadata
            .name
            .as_deref()
            .ok_or(ReconcilerError::MissingObjectKey("name"))?;
        Ok(Self::new(namespace, name))
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for SecretKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(anyhow::anyhow!(
                "Invalid secret key '{s}': expected '<namespace>/<name>'"
            )),
        }
    }
}

/// Shared reconciliation context handed to every reconcile pass
pub struct Reconciler {
    pub cache: Arc<dyn ObjectCache>,
    pub regenerator: Arc<dyn SecretRegenerator>,
    pub config: SharedControllerConfig,
    // Backoff state per secret (identified by namespace/name)
    // Owned by the error_policy() layer; reconcile() only clears it on success
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        cache: Arc<dyn ObjectCache>,
        regenerator: Arc<dyn SecretRegenerator>,
        config: SharedControllerConfig,
    ) -> Self {
        Self {
            cache,
            regenerator,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Share an existing backoff table, so retry budgets survive watch restarts
    #[must_use]
    pub fn with_backoff_states(
        mut self,
        backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    ) -> Self {
        self.backoff_states = backoff_states;
        self
    }

    /// Forget the retry history of a key after a successful pass
    pub fn reset_backoff(&self, key: &SecretKey) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(&key.to_string());
        }
    }
}
