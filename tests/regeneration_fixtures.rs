//! # Regeneration Fixture Tests
//!
//! The same fixture table runs once per annotation generation: resolve the
//! service, check validity, and (for valid pairs) ask the regeneration policy
//! with a one hour lead time.

mod common;

use chrono::TimeDelta;
use common::{service, SecretBuilder};
use k8s_openapi::api::core::v1::{Secret, Service};
use serving_cert_controller::controller::annotations::{AnnotationGeneration, CURRENT, LEGACY};
use serving_cert_controller::controller::binding::resolve_service;
use serving_cert_controller::controller::cache::MemoryCache;
use serving_cert_controller::controller::policy::needs_regeneration;
use serving_cert_controller::controller::validity::is_secret_valid_for_service;
use std::time::Duration;

const LEAD: Duration = Duration::from_secs(3600);

struct Fixture {
    name: &'static str,
    services: Vec<Service>,
    secret: Secret,
    expected: bool,
    service_is_valid: bool,
}

fn fixtures(generation: &AnnotationGeneration) -> Vec<Fixture> {
    let secret = || SecretBuilder::new(generation);
    vec![
        Fixture {
            name: "no service annotation",
            services: vec![],
            secret: secret().build(),
            expected: false,
            service_is_valid: false,
        },
        Fixture {
            name: "missing service",
            services: vec![],
            secret: secret().service_name("foo").build(),
            expected: false,
            service_is_valid: false,
        },
        Fixture {
            name: "service-uid-mismatch",
            services: vec![service(generation, "uid-2", "mysecret")],
            secret: secret()
                .service_name("foo")
                .service_uid("uid-1")
                .owner("foo", "uid-2")
                .build(),
            expected: false,
            service_is_valid: false,
        },
        Fixture {
            name: "service secret name mismatch",
            services: vec![service(generation, "uid-1", "mysecret2")],
            secret: secret()
                .service_name("foo")
                .service_uid("uid-1")
                .owner("foo", "uid-1")
                .build(),
            expected: false,
            service_is_valid: false,
        },
        Fixture {
            name: "no expiry",
            services: vec![service(generation, "uid-1", "mysecret")],
            secret: secret()
                .service_name("foo")
                .service_uid("uid-1")
                .owner("foo", "uid-1")
                .build(),
            expected: true,
            service_is_valid: true,
        },
        Fixture {
            name: "bad expiry",
            services: vec![service(generation, "uid-1", "mysecret")],
            secret: secret()
                .service_name("foo")
                .service_uid("uid-1")
                .expiry("bad-format")
                .owner("foo", "uid-1")
                .build(),
            expected: true,
            service_is_valid: true,
        },
        Fixture {
            name: "expired expiry",
            services: vec![service(generation, "uid-1", "mysecret")],
            secret: secret()
                .service_name("foo")
                .service_uid("uid-1")
                .expires_in(TimeDelta::minutes(-30))
                .owner("foo", "uid-1")
                .build(),
            expected: true,
            service_is_valid: true,
        },
        Fixture {
            name: "distant expiry",
            services: vec![service(generation, "uid-1", "mysecret")],
            secret: secret()
                .service_name("foo")
                .service_uid("uid-1")
                .expires_in(TimeDelta::minutes(10))
                .owner("foo", "uid-1")
                .with_certificate()
                .build(),
            expected: false,
            service_is_valid: true,
        },
        Fixture {
            name: "missing ownerref",
            services: vec![service(generation, "uid-1", "mysecret")],
            secret: secret()
                .service_name("foo")
                .service_uid("uid-1")
                .expires_in(TimeDelta::minutes(10))
                .owner("foo", "uid-2")
                .build(),
            expected: true,
            service_is_valid: true,
        },
    ]
}

fn run_fixtures(generation: &AnnotationGeneration) {
    for fixture in fixtures(generation) {
        let cache = MemoryCache::new();
        for service in fixture.services {
            cache.add_service(service);
        }

        let Some(service) = resolve_service(&cache, &fixture.secret) else {
            assert!(
                !fixture.expected,
                "{} ({}): should have returned service",
                fixture.name, generation.label
            );
            continue;
        };

        let is_valid = is_secret_valid_for_service(&service, &fixture.secret);
        assert_eq!(
            is_valid, fixture.service_is_valid,
            "{} ({}): unexpected validity",
            fixture.name, generation.label
        );

        if fixture.service_is_valid {
            assert_eq!(
                needs_regeneration(&service, &fixture.secret, LEAD),
                fixture.expected,
                "{} ({}): unexpected regeneration decision",
                fixture.name,
                generation.label
            );
        }
    }
}

#[test]
fn test_requires_regeneration_legacy_annotations() {
    run_fixtures(&LEGACY);
}

#[test]
fn test_requires_regeneration_current_annotations() {
    run_fixtures(&CURRENT);
}

#[test]
fn test_expiry_beyond_lead_time_is_kept() {
    for generation in [CURRENT, LEGACY] {
        let cache = MemoryCache::new();
        cache.add_service(service(&generation, "uid-1", "mysecret"));
        let secret = SecretBuilder::new(&generation)
            .service_name("foo")
            .service_uid("uid-1")
            .expires_in(TimeDelta::hours(2))
            .owner("foo", "uid-1")
            .build();

        let service = resolve_service(&cache, &secret).unwrap();
        assert!(is_secret_valid_for_service(&service, &secret));
        assert!(!needs_regeneration(&service, &secret, LEAD));
    }
}

#[test]
fn test_expiry_inside_lead_time_without_material_regenerates() {
    let cache = MemoryCache::new();
    cache.add_service(service(&CURRENT, "uid-1", "mysecret"));
    let secret = SecretBuilder::new(&CURRENT)
        .service_name("foo")
        .service_uid("uid-1")
        .expires_in(TimeDelta::minutes(10))
        .owner("foo", "uid-1")
        .build();

    let service = resolve_service(&cache, &secret).unwrap();
    assert!(needs_regeneration(&service, &secret, LEAD));
}

#[test]
fn test_generations_are_not_mixed() {
    // Service name under the current keys, UID only under the legacy keys
    let cache = MemoryCache::new();
    cache.add_service(service(&CURRENT, "uid-1", "mysecret"));
    let secret = SecretBuilder::new(&CURRENT).service_name("foo").build();
    let secret = {
        let mut secret = secret;
        secret
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(LEGACY.service_uid.to_string(), "uid-1".to_string());
        secret
    };

    let service = resolve_service(&cache, &secret).unwrap();
    assert!(!is_secret_valid_for_service(&service, &secret));
}
