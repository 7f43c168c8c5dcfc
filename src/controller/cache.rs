//! # Object Cache
//!
//! Read-only view of cluster Secrets and Services keyed by namespace/name.
//!
//! The decision code only depends on [`ObjectCache`]. In the running
//! controller it is backed by kube-runtime reflector stores that are fed by
//! the watch streams, so reads may lag the API server; every caller treats a
//! missing object as "not found" rather than an error. [`MemoryCache`] is a
//! fixture store for tests and tooling.
//!
//! Reflector stores are flat, so [`NamespaceIndex`] keeps the secret names of
//! each namespace alongside the store and the Service fan-out only touches
//! secrets of the Service's own namespace.

use k8s_openapi::api::core::v1::{Secret, Service};
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::watcher;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// Narrow read-only access to cached cluster objects
pub trait ObjectCache: Send + Sync {
    /// Look up a Service by namespace and name
    fn get_service(&self, namespace: &str, name: &str) -> Option<Arc<Service>>;

    /// Look up a Secret by namespace and name
    fn get_secret(&self, namespace: &str, name: &str) -> Option<Arc<Secret>>;

    /// All cached Secrets in a namespace
    fn list_secrets_in_namespace(&self, namespace: &str) -> Vec<Arc<Secret>>;
}

type NamesByNamespace = HashMap<String, BTreeSet<String>>;

/// Secret names per namespace, maintained from the same watcher events as the store
///
/// Mirrors the reflector's relist handling: objects seen between `Init` and
/// `InitDone` are buffered and replace the live index in one step.
#[derive(Debug, Clone, Default)]
pub struct NamespaceIndex {
    state: Arc<RwLock<IndexState>>,
}

#[derive(Debug, Default)]
struct IndexState {
    live: NamesByNamespace,
    relist: Option<NamesByNamespace>,
}

fn insert_name(index: &mut NamesByNamespace, secret: &Secret) {
    if let (Some(namespace), Some(name)) = (&secret.metadata.namespace, &secret.metadata.name) {
        index.entry(namespace.clone()).or_default().insert(name.clone());
    }
}

impl NamespaceIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one watcher event
    pub fn apply_watcher_event(&self, event: &watcher::Event<Secret>) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        match event {
            watcher::Event::Apply(secret) => insert_name(&mut state.live, secret),
            watcher::Event::Delete(secret) => {
                let (Some(namespace), Some(name)) =
                    (&secret.metadata.namespace, &secret.metadata.name)
                else {
                    return;
                };
                if let Some(names) = state.live.get_mut(namespace) {
                    names.remove(name);
                    if names.is_empty() {
                        state.live.remove(namespace);
                    }
                }
            }
            watcher::Event::Init => state.relist = Some(HashMap::new()),
            watcher::Event::InitApply(secret) => {
                insert_name(state.relist.as_mut().unwrap_or(&mut state.live), secret);
            }
            watcher::Event::InitDone => {
                if let Some(relisted) = state.relist.take() {
                    state.live = relisted;
                }
            }
        }
    }

    /// Secret names in `namespace`, sorted
    #[must_use]
    pub fn names_in(&self, namespace: &str) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .live
            .get(namespace)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Cache backed by kube-runtime reflector stores
#[derive(Clone)]
pub struct ReflectorCache {
    services: Store<Service>,
    secrets: Store<Secret>,
    secret_index: NamespaceIndex,
}

impl std::fmt::Debug for ReflectorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectorCache")
            .field("services", &self.services.len())
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

impl ReflectorCache {
    #[must_use]
    pub fn new(services: Store<Service>, secrets: Store<Secret>, secret_index: NamespaceIndex) -> Self {
        Self {
            services,
            secrets,
            secret_index,
        }
    }
}

impl ObjectCache for ReflectorCache {
    fn get_service(&self, namespace: &str, name: &str) -> Option<Arc<Service>> {
        self.services.get(&ObjectRef::new(name).within(namespace))
    }

    fn get_secret(&self, namespace: &str, name: &str) -> Option<Arc<Secret>> {
        self.secrets.get(&ObjectRef::new(name).within(namespace))
    }

    fn list_secrets_in_namespace(&self, namespace: &str) -> Vec<Arc<Secret>> {
        self.secret_index
            .names_in(namespace)
            .iter()
            .filter_map(|name| self.secrets.get(&ObjectRef::new(name).within(namespace)))
            .collect()
    }
}

type Key = (String, String);

fn key_of(namespace: Option<&str>, name: Option<&str>) -> Key {
    (
        namespace.unwrap_or_default().to_string(),
        name.unwrap_or_default().to_string(),
    )
}

/// In-memory cache, primed by hand
#[derive(Debug, Default)]
pub struct MemoryCache {
    services: RwLock<HashMap<Key, Arc<Service>>>,
    secrets: RwLock<HashMap<Key, Arc<Secret>>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a Service
    pub fn add_service(&self, service: Service) {
        let key = key_of(
            service.metadata.namespace.as_deref(),
            service.metadata.name.as_deref(),
        );
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::new(service));
    }

    /// Insert or replace a Secret
    pub fn add_secret(&self, secret: Secret) {
        let key = key_of(
            secret.metadata.namespace.as_deref(),
            secret.metadata.name.as_deref(),
        );
        self.secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::new(secret));
    }

    /// Remove a Service, returning it if it was cached
    pub fn remove_service(&self, namespace: &str, name: &str) -> Option<Arc<Service>> {
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key_of(Some(namespace), Some(name)))
    }

    /// Remove a Secret, returning it if it was cached
    pub fn remove_secret(&self, namespace: &str, name: &str) -> Option<Arc<Secret>> {
        self.secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key_of(Some(namespace), Some(name)))
    }
}

impl ObjectCache for MemoryCache {
    fn get_service(&self, namespace: &str, name: &str) -> Option<Arc<Service>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key_of(Some(namespace), Some(name)))
            .cloned()
    }

    fn get_secret(&self, namespace: &str, name: &str) -> Option<Arc<Secret>> {
        self.secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key_of(Some(namespace), Some(name)))
            .cloned()
    }

    fn list_secrets_in_namespace(&self, namespace: &str) -> Vec<Arc<Secret>> {
        let mut secrets: Vec<Arc<Secret>> = self
            .secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, secret)| Arc::clone(secret))
            .collect();
        secrets.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        secrets
    }
}
