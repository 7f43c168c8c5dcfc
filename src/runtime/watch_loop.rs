//! # Watch Loop
//!
//! Controller watch loop over Secrets. Service events are mapped back onto the
//! Secrets bound to them, so a Service deleted and recreated under a new UID
//! is noticed without waiting for the Secret to change.

use crate::config::SharedControllerConfig;
use crate::controller::backoff::BackoffState;
use crate::controller::binding::secrets_bound_to_service;
use crate::controller::cache::{NamespaceIndex, ReflectorCache};
use crate::controller::reconciler::{
    reconcile, KubeSecretRegenerator, Reconciler, SecretRegenerator,
};
use crate::controller::server::ServerState;
use crate::runtime::error_policy::{
    forget_deleted_secret, handle_reconciliation_error, handle_watch_stream_error,
};
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::Api;
use kube::Client;
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{controller, reflector, watcher, Controller, WatchStreamExt};
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Run the controller watch loop
///
/// Sets up reflectors for Secrets and Services, runs the kube-runtime
/// controller over Secrets, and restarts it if the stream ends before a
/// shutdown was requested. Retry budgets survive restarts.
///
/// # Errors
///
/// Currently always returns `Ok(())` once shutdown completes.
pub async fn run_watch_loop(
    client: Client,
    server_state: Arc<ServerState>,
    controller_config: SharedControllerConfig,
) -> Result<(), anyhow::Error> {
    let backoff_start_ms = controller_config.read().await.backoff_start_ms;
    let watch_backoff_ms = Arc::new(AtomicU64::new(backoff_start_ms));
    let backoff_states: Arc<Mutex<HashMap<String, BackoffState>>> =
        Arc::new(Mutex::new(HashMap::new()));
    let regenerator: Arc<dyn SecretRegenerator> =
        Arc::new(KubeSecretRegenerator::new(client.clone()));

    // Mark not ready on SIGTERM/SIGINT; the controller itself drains via shutdown_on_signal()
    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let config = controller_config.read().await.clone();

        let (secrets, services): (Api<Secret>, Api<Service>) = match &config.watch_namespace {
            Some(namespace) => (
                Api::namespaced(client.clone(), namespace),
                Api::namespaced(client.clone(), namespace),
            ),
            None => (Api::all(client.clone()), Api::all(client.clone())),
        };

        let (secret_store, secret_writer) = reflector::store();
        let secret_index = NamespaceIndex::new();
        let index_writer = secret_index.clone();
        let secret_events = watcher(secrets, watcher::Config::default()).map_ok(move |event| {
            index_writer.apply_watcher_event(&event);
            event
        });
        let secret_reflector = reflector(secret_writer, secret_events)
            .touched_objects()
            .default_backoff();

        let (service_store, service_writer) = reflector::store();
        let service_reflector =
            reflector(service_writer, watcher(services, watcher::Config::default()))
                .touched_objects()
                .default_backoff();

        let cache = Arc::new(ReflectorCache::new(
            service_store,
            secret_store.clone(),
            secret_index,
        ));
        let mapper_cache = Arc::clone(&cache);
        let ctx = Arc::new(
            Reconciler::new(cache, Arc::clone(&regenerator), Arc::clone(&controller_config))
                .with_backoff_states(Arc::clone(&backoff_states)),
        );

        info!(
            namespace = config.watch_namespace.as_deref().unwrap_or("*"),
            concurrency = config.max_concurrent_reconciliations,
            "Starting controller watch loop..."
        );
        let watch_backoff = Arc::clone(&watch_backoff_ms);
        let config_for_filter = Arc::clone(&controller_config);
        let events_ctx = Arc::clone(&ctx);
        Controller::for_stream(secret_reflector, secret_store)
            .with_config(
                controller::Config::default().concurrency(config.max_concurrent_reconciliations),
            )
            .watches_stream(service_reflector, move |service: Service| {
                let Some(namespace) = service.metadata.namespace.clone() else {
                    return Vec::new();
                };
                secrets_bound_to_service(mapper_cache.as_ref(), &service)
                    .into_iter()
                    .map(|name| ObjectRef::<Secret>::new(&name).within(&namespace))
                    .collect::<Vec<_>>()
            })
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, ctx)
            .for_each(move |result| {
                let backoff = Arc::clone(&watch_backoff);
                let config = Arc::clone(&config_for_filter);
                let ctx = Arc::clone(&events_ctx);
                async move {
                    match result {
                        Ok((object, action)) => {
                            let backoff_start = config.read().await.backoff_start_ms;
                            backoff.store(backoff_start, std::sync::atomic::Ordering::Relaxed);
                            debug!(secret = %object, action = ?action, "watch.event.reconciled");
                        }
                        // Already handled by the error policy
                        Err(controller::Error::ReconcilerFailed(error, object)) => {
                            debug!(secret = %object, error = %error, "watch.event.reconciliation_failed");
                        }
                        Err(controller::Error::ObjectNotFound(object)) => {
                            forget_deleted_secret(&ctx, object.namespace.as_deref(), &object.name);
                            debug!(secret = %object, "watch.event.object_gone");
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            let (max_backoff, restart_delay) = {
                                let config = config.read().await;
                                (config.backoff_max_ms, config.watch_restart_delay_secs)
                            };
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                max_backoff,
                                restart_delay,
                            )
                            .await;
                        }
                    }
                }
            })
            .await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = controller_config
            .read()
            .await
            .watch_restart_delay_after_end_duration();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
