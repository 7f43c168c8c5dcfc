//! # Regenerate
//!
//! The regeneration action: delete the secret so the signer recreates it with
//! fresh material. This controller never writes certificate bytes itself.

use anyhow::Context;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, Preconditions};
use kube::Client;
use tracing::{debug, info};

/// Replaces a secret's certificate by removing the secret
#[async_trait]
pub trait SecretRegenerator: Send + Sync {
    /// Delete `namespace/name`, but only while it still has `uid`
    ///
    /// A secret that is already gone, or already replaced by a newer object,
    /// counts as regenerated.
    async fn regenerate(&self, namespace: &str, name: &str, uid: Option<&str>)
        -> anyhow::Result<()>;
}

/// Regenerator that deletes through the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretRegenerator {
    client: Client,
}

impl std::fmt::Debug for KubeSecretRegenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretRegenerator").finish_non_exhaustive()
    }
}

impl KubeSecretRegenerator {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretRegenerator for KubeSecretRegenerator {
    async fn regenerate(
        &self,
        namespace: &str,
        name: &str,
        uid: Option<&str>,
    ) -> anyhow::Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let params = DeleteParams {
            preconditions: uid.map(|uid| Preconditions {
                uid: Some(uid.to_string()),
                resource_version: None,
            }),
            ..DeleteParams::default()
        };

        match api.delete(name, &params).await {
            Ok(_) => {
                info!(secret.namespace = namespace, secret.name = name, "Deleted secret for regeneration");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(secret.namespace = namespace, secret.name = name, "Secret already deleted");
                Ok(())
            }
            // UID precondition failed: the secret was already recreated
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                debug!(secret.namespace = namespace, secret.name = name, "Secret already replaced");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to delete secret {namespace}/{name}")),
        }
    }
}
