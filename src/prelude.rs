//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use serving_cert_controller::prelude::*;
//! ```

// Decision core
pub use crate::controller::binding::{resolve_service, secrets_bound_to_service};
pub use crate::controller::policy::{needs_regeneration, RegenerationReason};
pub use crate::controller::validity::is_secret_valid_for_service;

// Collaborator seams
pub use crate::controller::cache::{MemoryCache, NamespaceIndex, ObjectCache, ReflectorCache};
pub use crate::controller::reconciler::{
    evaluate, reconcile, Action, Reconciler, ReconcilerError, SecretKey, SecretRegenerator,
};

// Config types
pub use crate::config::{ControllerConfig, ServerConfig};
