//! # Reconciler
//!
//! Drives one Secret key through binding resolution, validity checking and
//! the regeneration policy, and performs the regeneration when required.

mod evaluate;
mod reconcile;
mod regenerate;
mod types;

pub use evaluate::{evaluate, evaluate_at, Action, Evaluation};
pub use reconcile::reconcile;
pub use regenerate::{KubeSecretRegenerator, SecretRegenerator};
pub use types::{Reconciler, ReconcilerError, SecretKey, TriggerSource};
