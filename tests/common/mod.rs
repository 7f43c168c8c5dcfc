//! Common test fixtures
//!
//! Builders for Services and Secrets annotated with either annotation
//! generation, plus a recording regenerator.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use serving_cert_controller::constants::{TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use serving_cert_controller::controller::annotations::AnnotationGeneration;
use serving_cert_controller::controller::reconciler::SecretRegenerator;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub const NAMESPACE: &str = "ns1";

/// Service `foo` with the given UID, declaring `secret_name` under `generation`
pub fn service(generation: &AnnotationGeneration, uid: &str, secret_name: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            namespace: Some(NAMESPACE.to_string()),
            name: Some("foo".to_string()),
            uid: Some(uid.to_string()),
            annotations: Some(BTreeMap::from([(
                generation.secret_name.to_string(),
                secret_name.to_string(),
            )])),
            ..ObjectMeta::default()
        },
        ..Service::default()
    }
}

/// Builder for the `mysecret` Secret
#[derive(Debug, Clone)]
pub struct SecretBuilder {
    secret: Secret,
    generation: AnnotationGeneration,
}

impl SecretBuilder {
    pub fn new(generation: &AnnotationGeneration) -> Self {
        Self {
            secret: Secret {
                metadata: ObjectMeta {
                    namespace: Some(NAMESPACE.to_string()),
                    name: Some("mysecret".to_string()),
                    uid: Some("secret-uid-1".to_string()),
                    annotations: Some(BTreeMap::new()),
                    ..ObjectMeta::default()
                },
                ..Secret::default()
            },
            generation: *generation,
        }
    }

    fn annotate(mut self, key: &str, value: &str) -> Self {
        self.secret
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn service_name(self, name: &str) -> Self {
        let key = self.generation.service_name;
        self.annotate(key, name)
    }

    pub fn service_uid(self, uid: &str) -> Self {
        let key = self.generation.service_uid;
        self.annotate(key, uid)
    }

    pub fn expiry(self, value: &str) -> Self {
        let key = self.generation.expiry;
        self.annotate(key, value)
    }

    /// Expiry at now + `offset`
    pub fn expires_in(self, offset: TimeDelta) -> Self {
        let value = (Utc::now() + offset).to_rfc3339();
        self.expiry(&value)
    }

    pub fn owner(mut self, name: &str, uid: &str) -> Self {
        self.secret
            .metadata
            .owner_references
            .get_or_insert_with(Vec::new)
            .push(OwnerReference {
                api_version: "v1".to_string(),
                kind: "Service".to_string(),
                name: name.to_string(),
                uid: uid.to_string(),
                ..OwnerReference::default()
            });
        self
    }

    pub fn with_certificate(mut self) -> Self {
        self.secret.data = Some(BTreeMap::from([
            (TLS_CERT_KEY.to_string(), ByteString(b"content".to_vec())),
            (TLS_PRIVATE_KEY_KEY.to_string(), ByteString(b"morecontent".to_vec())),
        ]));
        self
    }

    pub fn build(self) -> Secret {
        self.secret
    }
}

/// Regenerator that records calls and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingRegenerator {
    pub calls: Mutex<Vec<(String, String, Option<String>)>>,
    pub fail: Mutex<bool>,
}

impl RecordingRegenerator {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: Mutex::new(true),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SecretRegenerator for RecordingRegenerator {
    async fn regenerate(
        &self,
        namespace: &str,
        name: &str,
        uid: Option<&str>,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push((
            namespace.to_string(),
            name.to_string(),
            uid.map(str::to_string),
        ));
        if *self.fail.lock().unwrap() {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}
