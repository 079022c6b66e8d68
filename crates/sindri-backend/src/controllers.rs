/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Watch-based controllers feeding the preprocess event loop.
//!
//! One watcher per resource kind (the four Sindri kinds plus Secrets).
//! Watchers are intentionally dumb: every add/modify/delete becomes a
//! reconcile request keyed by `(kind, namespace, name)`, and the event loop
//! hierarchy decides what, if anything, the change means.

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, WatchEvent, WatchParams};
use kube::Api;
use kube::Client as K8sClient;
use kube::Resource;
use tracing::{error, info, warn};

use sindri_models::api::{
    GROUP, KIND_GITOPS_DEPLOYMENT, KIND_MANAGED_ENVIRONMENT, KIND_REPOSITORY_CREDENTIAL,
    KIND_SECRET, KIND_SYNC_RUN, VERSION,
};

use crate::cluster::WorkspaceClient;
use crate::eventloop::preprocess_event_loop::PreprocessEventLoop;

const WATCH_RESTART_DELAY: Duration = Duration::from_secs(5);

/// Spawns one watcher task per kind. Watchers run until the process exits,
/// restarting their streams whenever the API server closes them.
pub fn start_watchers(
    k8s_client: K8sClient,
    preprocess_event_loop: PreprocessEventLoop,
    workspace_client: Arc<dyn WorkspaceClient>,
) {
    for kind in [
        KIND_GITOPS_DEPLOYMENT,
        KIND_SYNC_RUN,
        KIND_MANAGED_ENVIRONMENT,
        KIND_REPOSITORY_CREDENTIAL,
    ] {
        tokio::spawn(watch_custom_kind(
            k8s_client.clone(),
            kind,
            preprocess_event_loop.clone(),
            workspace_client.clone(),
        ));
    }

    tokio::spawn(watch_secrets(
        k8s_client,
        preprocess_event_loop,
        workspace_client,
    ));
}

async fn watch_custom_kind(
    k8s_client: K8sClient,
    kind: &'static str,
    preprocess_event_loop: PreprocessEventLoop,
    workspace_client: Arc<dyn WorkspaceClient>,
) {
    let ar = ApiResource::from_gvk(&GroupVersionKind::gvk(GROUP, VERSION, kind));
    let api: Api<DynamicObject> = Api::all_with(k8s_client, &ar);

    info!(%kind, "starting watcher");
    loop {
        match api.watch(&WatchParams::default(), "0").await {
            Ok(stream) => {
                let mut stream = stream.boxed();
                loop {
                    match stream.try_next().await {
                        Ok(Some(event)) => {
                            if let Some((namespace, name)) = object_identity(&event) {
                                preprocess_event_loop.handle_reconcile_request(
                                    kind,
                                    &namespace,
                                    &name,
                                    workspace_client.clone(),
                                );
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            warn!(%kind, "watch stream error: {}", err);
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                error!(%kind, "unable to start watch: {}", err);
            }
        }

        tokio::time::sleep(WATCH_RESTART_DELAY).await;
    }
}

async fn watch_secrets(
    k8s_client: K8sClient,
    preprocess_event_loop: PreprocessEventLoop,
    workspace_client: Arc<dyn WorkspaceClient>,
) {
    let api: Api<Secret> = Api::all(k8s_client);

    info!(kind = KIND_SECRET, "starting watcher");
    loop {
        match api.watch(&WatchParams::default(), "0").await {
            Ok(stream) => {
                let mut stream = stream.boxed();
                loop {
                    match stream.try_next().await {
                        Ok(Some(event)) => {
                            let secret = match &event {
                                WatchEvent::Added(s)
                                | WatchEvent::Modified(s)
                                | WatchEvent::Deleted(s) => Some(s),
                                _ => None,
                            };
                            if let Some(secret) = secret {
                                let namespace =
                                    secret.meta().namespace.clone().unwrap_or_default();
                                let name = secret.meta().name.clone().unwrap_or_default();
                                preprocess_event_loop.handle_reconcile_request(
                                    KIND_SECRET,
                                    &namespace,
                                    &name,
                                    workspace_client.clone(),
                                );
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            warn!(kind = KIND_SECRET, "watch stream error: {}", err);
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                error!(kind = KIND_SECRET, "unable to start watch: {}", err);
            }
        }

        tokio::time::sleep(WATCH_RESTART_DELAY).await;
    }
}

fn object_identity(event: &WatchEvent<DynamicObject>) -> Option<(String, String)> {
    let obj = match event {
        WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => obj,
        WatchEvent::Bookmark(_) => return None,
        WatchEvent::Error(err) => {
            warn!("watch event error: {}", err.message);
            return None;
        }
    };

    Some((
        obj.metadata.namespace.clone().unwrap_or_default(),
        obj.metadata.name.clone().unwrap_or_default(),
    ))
}
