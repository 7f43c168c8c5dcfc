//! # Controller
//!
//! Core controller modules for the serving certificate controller.
//!
//! - `annotations`: annotation generations and per-object lookups
//! - `backoff`: exponential backoff for retries
//! - `binding`: resolves the Service a Secret answers for
//! - `cache`: read-only view of cached Secrets and Services
//! - `policy`: expiry-driven regeneration decisions
//! - `reconciler`: core reconciliation logic
//! - `server`: HTTP server for metrics and health checks
//! - `validity`: bidirectional binding check

pub mod annotations;
pub mod backoff;
pub mod binding;
pub mod cache;
pub mod policy;
pub mod reconciler;
pub mod server;
pub mod validity;
