//! # Annotation Generations
//!
//! Serving-cert annotations exist in two generations: the current `beta` keys
//! and the legacy `alpha` keys. They carry the same meaning. Lookups walk
//! [`GENERATIONS`] in order and use the first generation whose annotation is
//! present; keys are never combined across generations on one object.

use crate::constants::{
    ALPHA_SERVICE_NAME_ANNOTATION, ALPHA_SERVICE_UID_ANNOTATION,
    ALPHA_SERVING_CERT_EXPIRY_ANNOTATION, ALPHA_SERVING_CERT_SECRET_ANNOTATION,
    SERVICE_NAME_ANNOTATION, SERVICE_UID_ANNOTATION, SERVING_CERT_EXPIRY_ANNOTATION,
    SERVING_CERT_SECRET_ANNOTATION,
};
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// One generation of serving-cert annotation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationGeneration {
    /// Short label used in logs
    pub label: &'static str,
    /// Secret: originating service name
    pub service_name: &'static str,
    /// Secret: originating service UID at issuance
    pub service_uid: &'static str,
    /// Service: name of the secret expected to hold the serving cert
    pub secret_name: &'static str,
    /// Secret: RFC3339 certificate expiry
    pub expiry: &'static str,
}

/// Current (`beta`) annotation keys
pub const CURRENT: AnnotationGeneration = AnnotationGeneration {
    label: "beta",
    service_name: SERVICE_NAME_ANNOTATION,
    service_uid: SERVICE_UID_ANNOTATION,
    secret_name: SERVING_CERT_SECRET_ANNOTATION,
    expiry: SERVING_CERT_EXPIRY_ANNOTATION,
};

/// Legacy (`alpha`) annotation keys
pub const LEGACY: AnnotationGeneration = AnnotationGeneration {
    label: "alpha",
    service_name: ALPHA_SERVICE_NAME_ANNOTATION,
    service_uid: ALPHA_SERVICE_UID_ANNOTATION,
    secret_name: ALPHA_SERVING_CERT_SECRET_ANNOTATION,
    expiry: ALPHA_SERVING_CERT_EXPIRY_ANNOTATION,
};

/// Lookup order: current first, then legacy
pub static GENERATIONS: [AnnotationGeneration; 2] = [CURRENT, LEGACY];

/// Read a non-empty annotation value
fn annotation<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.annotations
        .as_ref()?
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// The generation a secret was issued under, with the service name it records
///
/// Returns `None` when the secret carries no service-name annotation in any
/// generation, i.e. it is not managed by this controller.
#[must_use]
pub fn secret_service_name(secret: &Secret) -> Option<(&str, &'static AnnotationGeneration)> {
    GENERATIONS.iter().find_map(|generation| {
        annotation(&secret.metadata, generation.service_name).map(|name| (name, generation))
    })
}

/// The service UID recorded on the secret under the given generation
#[must_use]
pub fn secret_service_uid<'a>(secret: &'a Secret, generation: &AnnotationGeneration) -> Option<&'a str> {
    annotation(&secret.metadata, generation.service_uid)
}

/// The expiry recorded on the secret under the given generation
#[must_use]
pub fn secret_expiry<'a>(secret: &'a Secret, generation: &AnnotationGeneration) -> Option<&'a str> {
    annotation(&secret.metadata, generation.expiry)
}

/// The secret name a service declares for its serving cert (current, else legacy)
#[must_use]
pub fn service_secret_name(service: &Service) -> Option<&str> {
    GENERATIONS
        .iter()
        .find_map(|generation| annotation(&service.metadata, generation.secret_name))
}

/// Every secret name a service declares, across both generations, deduplicated
#[must_use]
pub fn service_secret_names(service: &Service) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::with_capacity(GENERATIONS.len());
    for generation in &GENERATIONS {
        if let Some(name) = annotation(&service.metadata, generation.secret_name) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn meta(annotations: &[(&str, &str)]) -> ObjectMeta {
        ObjectMeta {
            annotations: Some(
                annotations
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..ObjectMeta::default()
        }
    }

    #[test]
    fn test_secret_service_name_prefers_current() {
        let secret = Secret {
            metadata: meta(&[
                (ALPHA_SERVICE_NAME_ANNOTATION, "legacy"),
                (SERVICE_NAME_ANNOTATION, "current"),
            ]),
            ..Secret::default()
        };
        let (name, generation) = secret_service_name(&secret).unwrap();
        assert_eq!(name, "current");
        assert_eq!(*generation, CURRENT);
    }

    #[test]
    fn test_secret_fields_do_not_cross_generations() {
        // Service name under alpha, UID and expiry only under beta
        let secret = Secret {
            metadata: meta(&[
                (ALPHA_SERVICE_NAME_ANNOTATION, "foo"),
                (SERVICE_UID_ANNOTATION, "uid-1"),
                (SERVING_CERT_EXPIRY_ANNOTATION, "2030-01-01T00:00:00Z"),
            ]),
            ..Secret::default()
        };
        let (_, generation) = secret_service_name(&secret).unwrap();
        assert_eq!(*generation, LEGACY);
        assert_eq!(secret_service_uid(&secret, generation), None);
        assert_eq!(secret_expiry(&secret, generation), None);
    }

    #[test]
    fn test_empty_annotation_is_absent() {
        let secret = Secret {
            metadata: meta(&[(SERVICE_NAME_ANNOTATION, "")]),
            ..Secret::default()
        };
        assert!(secret_service_name(&secret).is_none());
    }

    #[test]
    fn test_no_annotations() {
        assert!(secret_service_name(&Secret::default()).is_none());
        assert!(service_secret_name(&Service::default()).is_none());
        assert!(service_secret_names(&Service::default()).is_empty());
    }

    #[test]
    fn test_service_secret_names_dedup() {
        let service = Service {
            metadata: meta(&[
                (SERVING_CERT_SECRET_ANNOTATION, "tls"),
                (ALPHA_SERVING_CERT_SECRET_ANNOTATION, "tls"),
            ]),
            ..Service::default()
        };
        assert_eq!(service_secret_names(&service), vec!["tls"]);

        let service = Service {
            metadata: meta(&[
                (SERVING_CERT_SECRET_ANNOTATION, "tls-new"),
                (ALPHA_SERVING_CERT_SECRET_ANNOTATION, "tls-old"),
            ]),
            ..Service::default()
        };
        assert_eq!(service_secret_name(&service), Some("tls-new"));
        assert_eq!(service_secret_names(&service), vec!["tls-new", "tls-old"]);
    }
}
