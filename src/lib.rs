//! Serving Certificate Controller Library
//!
//! Keeps TLS serving-certificate Secrets bound to the Services that requested
//! them, and deletes a Secret for regeneration when its binding has drifted or
//! its certificate is about to expire. Tests are included in the module files.
//!
//! ## Quick Start
//!
//! ```rust
//! use serving_cert_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod prelude;
pub mod runtime;
