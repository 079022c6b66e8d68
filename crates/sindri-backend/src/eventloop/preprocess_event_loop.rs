/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Preprocess Event Loop
//!
//! The entry point of the hierarchy. Raw reconcile requests name a resource
//! by `(kind, namespace, name)`; this loop resolves each to the workspace
//! and deployment lane it affects (consulting the mapping tables for kinds
//! that are not themselves deployments), debounces rapid-fire duplicates,
//! and dispatches to the right workspace event loop, spawning one per
//! namespace UID on demand.
//!
//! Debouncing is safe here because handlers are level-triggered: they
//! re-read resource and database state when they run, so dropping a
//! duplicate of an already-queued key loses no information.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use sindri_models::api::{
    KIND_GITOPS_DEPLOYMENT, KIND_MANAGED_ENVIRONMENT, KIND_REPOSITORY_CREDENTIAL, KIND_SECRET,
    KIND_SYNC_RUN, MANAGED_ENVIRONMENT_SECRET_TYPE,
};
use sindri_models::models::mappings::{
    API_RESOURCE_TYPE_SYNC_RUN, DB_RELATION_TYPE_SYNC_OPERATION,
};

use crate::cluster::WorkspaceClient;
use crate::dal::DatabaseQueries;
use crate::errors::ReconcileError;

use super::types::{EventLoopEvent, EventLoopEventType, ResourceRequest};
use super::workspace_event_loop::WorkspaceEventLoop;

/// Tuning for the preprocess loop and the lanes it spawns.
#[derive(Debug, Clone)]
pub struct PreprocessEventLoopConfig {
    /// Window within which duplicate requests for the same key are dropped.
    pub debounce_window: Duration,
    /// Period of the per-deployment status reconciliation tick.
    pub status_tick_period: Duration,
}

impl Default for PreprocessEventLoopConfig {
    fn default() -> Self {
        PreprocessEventLoopConfig {
            debounce_window: Duration::from_millis(250),
            status_tick_period: Duration::from_secs(15),
        }
    }
}

/// A raw reconcile request from the controller layer.
pub struct RawReconcileRequest {
    pub kind: String,
    pub request: ResourceRequest,
    pub client: Arc<dyn WorkspaceClient>,
}

#[derive(Clone)]
pub struct PreprocessEventLoop {
    sender: mpsc::UnboundedSender<RawReconcileRequest>,
}

impl PreprocessEventLoop {
    pub fn new(db: Arc<dyn DatabaseQueries>, config: PreprocessEventLoopConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(internal_preprocess_event_loop(receiver, db, config));
        PreprocessEventLoop { sender }
    }

    /// Enqueues a reconcile request. Never blocks the caller.
    pub fn handle_reconcile_request(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
        client: Arc<dyn WorkspaceClient>,
    ) {
        let _ = self.sender.send(RawReconcileRequest {
            kind: kind.to_string(),
            request: ResourceRequest {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            client,
        });
    }
}

async fn internal_preprocess_event_loop(
    mut receiver: mpsc::UnboundedReceiver<RawReconcileRequest>,
    db: Arc<dyn DatabaseQueries>,
    config: PreprocessEventLoopConfig,
) {
    let mut workspaces: HashMap<String, WorkspaceEventLoop> = HashMap::new();
    let mut recently_seen: HashMap<String, Instant> = HashMap::new();

    while let Some(raw) = receiver.recv().await {
        let debounce_key = format!("{}-{}", raw.kind, raw.request);
        let now = Instant::now();
        if let Some(last) = recently_seen.get(&debounce_key) {
            if now.duration_since(*last) < config.debounce_window {
                debug!(key = %debounce_key, "debounced duplicate reconcile request");
                continue;
            }
        }
        recently_seen.insert(debounce_key, now);
        if recently_seen.len() > 4096 {
            recently_seen
                .retain(|_, seen| now.duration_since(*seen) < config.debounce_window);
        }

        if let Err(err) = process_raw_request(&db, &mut workspaces, &config, raw).await {
            error!("unable to preprocess reconcile request: {}", err);
        }
    }
}

async fn process_raw_request(
    db: &Arc<dyn DatabaseQueries>,
    workspaces: &mut HashMap<String, WorkspaceEventLoop>,
    config: &PreprocessEventLoopConfig,
    raw: RawReconcileRequest,
) -> Result<(), ReconcileError> {
    let Some(namespace) = raw.client.get_namespace(&raw.request.namespace).await? else {
        warn!(
            namespace = %raw.request.namespace,
            "dropping reconcile request for a namespace that doesn't exist"
        );
        return Ok(());
    };
    let namespace_uid = namespace.metadata.uid.clone().unwrap_or_default();
    if namespace_uid.is_empty() {
        return Err(ReconcileError::Severe(format!(
            "namespace {} has no uid",
            raw.request.namespace
        )));
    }

    let events = resolve_events(db, &raw, &namespace_uid).await?;
    if events.is_empty() {
        return Ok(());
    }

    let workspace = workspaces.entry(namespace_uid.clone()).or_insert_with(|| {
        WorkspaceEventLoop::new(
            raw.request.namespace.clone(),
            namespace_uid.clone(),
            db.clone(),
            config.status_tick_period,
        )
    });

    for event in events {
        workspace.send_event(event);
    }

    Ok(())
}

/// Maps one raw request to the events it implies. A single Secret change may
/// fan out to several managed environment events; unknown kinds are fatal.
async fn resolve_events(
    db: &Arc<dyn DatabaseQueries>,
    raw: &RawReconcileRequest,
    namespace_uid: &str,
) -> Result<Vec<EventLoopEvent>, ReconcileError> {
    let make_event = |event_type, request: ResourceRequest, associated: String| EventLoopEvent {
        event_type,
        request,
        associated_deployment_name: associated,
        workspace_id: namespace_uid.to_string(),
        client: raw.client.clone(),
    };

    match raw.kind.as_str() {
        KIND_GITOPS_DEPLOYMENT => Ok(vec![make_event(
            EventLoopEventType::DeploymentModified,
            raw.request.clone(),
            raw.request.name.clone(),
        )]),

        KIND_SYNC_RUN => {
            match resolve_sync_run_deployment(db, raw, namespace_uid).await? {
                Some(deployment_name) => Ok(vec![make_event(
                    EventLoopEventType::SyncRunModified,
                    raw.request.clone(),
                    deployment_name,
                )]),
                None => {
                    warn!(
                        sync_run = %raw.request,
                        "sync run has no resolvable deployment; dropping event"
                    );
                    Ok(Vec::new())
                }
            }
        }

        KIND_MANAGED_ENVIRONMENT => Ok(vec![make_event(
            EventLoopEventType::ManagedEnvironmentModified,
            raw.request.clone(),
            String::new(),
        )]),

        KIND_REPOSITORY_CREDENTIAL => Ok(vec![make_event(
            EventLoopEventType::RepositoryCredentialModified,
            raw.request.clone(),
            String::new(),
        )]),

        KIND_SECRET => {
            // Only managed-environment secrets are interesting; a change to
            // one re-reconciles every environment that references it.
            if let Some(secret) = raw
                .client
                .get_secret(&raw.request.namespace, &raw.request.name)
                .await?
            {
                if secret.type_.as_deref() != Some(MANAGED_ENVIRONMENT_SECRET_TYPE) {
                    return Ok(Vec::new());
                }
            }

            let environments = raw
                .client
                .list_managed_environments(&raw.request.namespace)
                .await?;

            Ok(environments
                .into_iter()
                .filter(|env| env.spec.cluster_credentials_secret == raw.request.name)
                .filter_map(|env| env.metadata.name)
                .map(|env_name| {
                    make_event(
                        EventLoopEventType::ManagedEnvironmentModified,
                        ResourceRequest {
                            namespace: raw.request.namespace.clone(),
                            name: env_name,
                        },
                        String::new(),
                    )
                })
                .collect())
        }

        other => Err(ReconcileError::Severe(format!(
            "unrecognized resource kind in reconcile request: {}",
            other
        ))),
    }
}

/// A sync run routes to the lane of the deployment it syncs. Prefer the live
/// resource's spec; fall back to the mapping tables when the resource has
/// already been deleted.
async fn resolve_sync_run_deployment(
    db: &Arc<dyn DatabaseQueries>,
    raw: &RawReconcileRequest,
    namespace_uid: &str,
) -> Result<Option<String>, ReconcileError> {
    if let Some(sync_run) = raw
        .client
        .get_sync_run(&raw.request.namespace, &raw.request.name)
        .await?
    {
        if !sync_run.spec.gitops_deployment_name.is_empty() {
            return Ok(Some(sync_run.spec.gitops_deployment_name));
        }
    }

    let mappings = db.list_api_cr_to_database_mappings_for_api_resource(
        API_RESOURCE_TYPE_SYNC_RUN,
        &raw.request.name,
        &raw.request.namespace,
        namespace_uid,
    )?;

    for mapping in mappings
        .iter()
        .filter(|m| m.db_relation_type == DB_RELATION_TYPE_SYNC_OPERATION)
    {
        if let Some(sync_operation) = db.get_sync_operation_by_id(&mapping.db_relation_key)? {
            return Ok(Some(sync_operation.deployment_name));
        }
    }

    Ok(None)
}
