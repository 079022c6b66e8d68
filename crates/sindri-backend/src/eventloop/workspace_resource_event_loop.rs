/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Workspace Resource Event Loop
//!
//! One instance per namespace, handling events for namespace-scoped shared
//! resources (RepositoryCredential, ManagedEnvironment), the resources that
//! can be referenced by multiple GitOpsDeployments at once. Each event maps to a
//! `"<kind>-<namespace>-<name>"` retry-loop key, so duplicate events coalesce
//! and failed reconciles back off per resource.
//!
//! Only the workspace event loop constructs this type.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use sindri_utils::backoff::ExponentialBackoff;
use sindri_utils::task_retry_loop::{RetryableTask, TaskError, TaskRetryLoop};

use crate::dal::DatabaseQueries;
use crate::errors::ReconcileError;

use super::shared_resource_loop::{ApiNamespace, SharedResourceEventLoop};
use super::types::{EventLoopEvent, WorkspaceEventLoopMessage};

pub(crate) struct WorkspaceResourceEventLoop {
    sender: mpsc::UnboundedSender<WorkspaceResourceLoopMessage>,
}

enum WorkspaceResourceLoopMessage {
    ProcessRepositoryCredential(EventLoopEvent),
    ProcessManagedEnvironment(EventLoopEvent),
}

impl WorkspaceResourceEventLoop {
    pub(crate) fn new(
        shared_resource_loop: SharedResourceEventLoop,
        workspace_event_loop_sender: mpsc::UnboundedSender<WorkspaceEventLoopMessage>,
        db: Arc<dyn DatabaseQueries>,
        namespace_name: &str,
        namespace_uid: &str,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        tokio::spawn(internal_workspace_resource_event_loop(
            receiver,
            shared_resource_loop,
            workspace_event_loop_sender,
            db,
            format!(
                "workspace-resource-event-retry-loop-{}-{}",
                namespace_name, namespace_uid
            ),
        ));

        WorkspaceResourceEventLoop { sender }
    }

    /// Async: does not wait for the loop to process the event.
    pub(crate) fn process_repository_credential(&self, event: EventLoopEvent) {
        let _ = self
            .sender
            .send(WorkspaceResourceLoopMessage::ProcessRepositoryCredential(event));
    }

    /// Async: does not wait for the loop to process the event.
    pub(crate) fn process_managed_environment(&self, event: EventLoopEvent) {
        let _ = self
            .sender
            .send(WorkspaceResourceLoopMessage::ProcessManagedEnvironment(event));
    }
}

async fn internal_workspace_resource_event_loop(
    mut receiver: mpsc::UnboundedReceiver<WorkspaceResourceLoopMessage>,
    shared_resource_loop: SharedResourceEventLoop,
    workspace_event_loop_sender: mpsc::UnboundedSender<WorkspaceEventLoopMessage>,
    db: Arc<dyn DatabaseQueries>,
    retry_loop_name: String,
) {
    let task_retry_loop = TaskRetryLoop::new(&retry_loop_name);

    while let Some(msg) = receiver.recv().await {
        let (map_key, task) = match msg {
            WorkspaceResourceLoopMessage::ProcessRepositoryCredential(event) => (
                format!(
                    "repo-cred-{}-{}",
                    event.request.namespace, event.request.name
                ),
                WorkspaceResourceEventTask {
                    event,
                    kind: WorkspaceResourceKind::RepositoryCredential,
                    db: db.clone(),
                    shared_resource_loop: shared_resource_loop.clone(),
                    workspace_event_loop_sender: workspace_event_loop_sender.clone(),
                },
            ),
            WorkspaceResourceLoopMessage::ProcessManagedEnvironment(event) => (
                format!(
                    "managed-env-{}-{}",
                    event.request.namespace, event.request.name
                ),
                WorkspaceResourceEventTask {
                    event,
                    kind: WorkspaceResourceKind::ManagedEnvironment,
                    db: db.clone(),
                    shared_resource_loop: shared_resource_loop.clone(),
                    workspace_event_loop_sender: workspace_event_loop_sender.clone(),
                },
            ),
        };

        task_retry_loop.add_task_if_not_present(
            &map_key,
            Box::new(task),
            ExponentialBackoff::default_policy(),
        );
    }
}

#[derive(Clone, Copy)]
enum WorkspaceResourceKind {
    RepositoryCredential,
    ManagedEnvironment,
}

struct WorkspaceResourceEventTask {
    event: EventLoopEvent,
    kind: WorkspaceResourceKind,
    db: Arc<dyn DatabaseQueries>,
    shared_resource_loop: SharedResourceEventLoop,
    workspace_event_loop_sender: mpsc::UnboundedSender<WorkspaceEventLoopMessage>,
}

#[async_trait]
impl RetryableTask for WorkspaceResourceEventTask {
    async fn perform_task(&mut self) -> (bool, Option<TaskError>) {
        match self.process().await {
            Ok(()) => (false, None),
            Err(err) if err.is_user_error() => {
                // The user must fix their resource; retrying cannot help.
                info!("user error processing workspace resource: {}", err);
                (false, None)
            }
            Err(err) if err.is_retryable() => (true, Some(err.into())),
            Err(err) => (false, Some(err.into())),
        }
    }
}

impl WorkspaceResourceEventTask {
    async fn process(&self) -> Result<(), ReconcileError> {
        let request = &self.event.request;

        // A message for a resource in a namespace that no longer exists is
        // stale; drop it without retry.
        let Some(namespace) = self.event.client.get_namespace(&request.namespace).await? else {
            warn!(
                namespace = %request.namespace,
                "received a workspace resource message for a namespace that doesn't exist"
            );
            return Ok(());
        };
        let api_namespace = ApiNamespace {
            name: request.namespace.clone(),
            uid: namespace.metadata.uid.unwrap_or_default(),
        };

        match self.kind {
            WorkspaceResourceKind::RepositoryCredential => {
                self.shared_resource_loop
                    .reconcile_repository_credential(
                        self.event.client.clone(),
                        api_namespace,
                        &request.name,
                    )
                    .await?;
                Ok(())
            }
            WorkspaceResourceKind::ManagedEnvironment => {
                self.shared_resource_loop
                    .reconcile_shared_managed_env(
                        self.event.client.clone(),
                        api_namespace,
                        &request.name,
                        false,
                    )
                    .await?;

                // Hand the processed environment back to the workspace loop
                // so it can fan out to dependent deployments.
                if self
                    .workspace_event_loop_sender
                    .send(WorkspaceEventLoopMessage::ManagedEnvProcessed(
                        self.event.clone(),
                    ))
                    .is_err()
                {
                    error!("workspace event loop is gone; dropping managed env fan-out");
                }
                Ok(())
            }
        }
    }
}
