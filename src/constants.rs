//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Annotation keys come in two generations. The legacy `alpha` keys are still
//! honoured for objects created before the current `beta` keys existed.
//! Defaults can be overridden via configuration or environment variables.

/// Service annotation naming the secret that should hold its serving certificate
pub const SERVING_CERT_SECRET_ANNOTATION: &str = "service.beta.openshift.io/serving-cert-secret-name";
/// Legacy form of [`SERVING_CERT_SECRET_ANNOTATION`]
pub const ALPHA_SERVING_CERT_SECRET_ANNOTATION: &str =
    "service.alpha.openshift.io/serving-cert-secret-name";

/// Secret annotation recording the name of the service the certificate was issued for
pub const SERVICE_NAME_ANNOTATION: &str = "service.beta.openshift.io/originating-service-name";
/// Legacy form of [`SERVICE_NAME_ANNOTATION`]
pub const ALPHA_SERVICE_NAME_ANNOTATION: &str =
    "service.alpha.openshift.io/originating-service-name";

/// Secret annotation recording the UID of the service at issuance time
pub const SERVICE_UID_ANNOTATION: &str = "service.beta.openshift.io/originating-service-uid";
/// Legacy form of [`SERVICE_UID_ANNOTATION`]
pub const ALPHA_SERVICE_UID_ANNOTATION: &str = "service.alpha.openshift.io/originating-service-uid";

/// Secret annotation recording the certificate expiry (RFC3339)
pub const SERVING_CERT_EXPIRY_ANNOTATION: &str = "service.beta.openshift.io/expiry";
/// Legacy form of [`SERVING_CERT_EXPIRY_ANNOTATION`]
pub const ALPHA_SERVING_CERT_EXPIRY_ANNOTATION: &str = "service.alpha.openshift.io/expiry";

/// Secret data key holding the PEM certificate
pub const TLS_CERT_KEY: &str = "tls.crt";
/// Secret data key holding the PEM private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Default regeneration lead time
pub const DEFAULT_MIN_TIME_LEFT: &str = "1h";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// First retry delay after a transient failure (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Retry delay cap (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 300_000;

/// Retries per secret before giving up until the next change event
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Worker pool size
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;
