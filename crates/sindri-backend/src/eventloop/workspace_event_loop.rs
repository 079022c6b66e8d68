/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Workspace Event Loop
//!
//! One per namespace UID. Routes deployment-shaped events to per-deployment
//! application event loops (spawning them on first sight and reaping them
//! when they report stopped), hands namespace-scoped shared resource events
//! to the workspace resource loop, and fans `ManagedEnvProcessed` messages
//! out to every deployment lane whose deployment references the processed
//! environment.
//!
//! The per-deployment lanes are owned by this loop; the message channel from
//! lane back to parent is the only reverse edge, keeping ownership acyclic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info_span, Instrument};

use sindri_models::models::mappings::DB_RELATION_TYPE_MANAGED_ENVIRONMENT;

use crate::dal::DatabaseQueries;
use crate::errors::ReconcileError;

use super::application_event_loop::ApplicationEventLoop;
use super::shared_resource_loop::SharedResourceEventLoop;
use super::types::{EventLoopEvent, EventLoopEventType, WorkspaceEventLoopMessage};
use super::workspace_resource_event_loop::WorkspaceResourceEventLoop;

pub struct WorkspaceEventLoop {
    sender: mpsc::UnboundedSender<WorkspaceEventLoopMessage>,
}

impl WorkspaceEventLoop {
    pub fn new(
        namespace_name: String,
        namespace_uid: String,
        db: Arc<dyn DatabaseQueries>,
        status_tick_period: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        let span = info_span!("workspace_event_loop", namespace = %namespace_name);
        tokio::spawn(
            internal_workspace_event_loop(
                receiver,
                sender.clone(),
                namespace_name,
                namespace_uid,
                db,
                status_tick_period,
            )
            .instrument(span),
        );

        WorkspaceEventLoop { sender }
    }

    pub fn send_event(&self, event: EventLoopEvent) {
        let _ = self.sender.send(WorkspaceEventLoopMessage::Event(event));
    }
}

async fn internal_workspace_event_loop(
    mut receiver: mpsc::UnboundedReceiver<WorkspaceEventLoopMessage>,
    own_sender: mpsc::UnboundedSender<WorkspaceEventLoopMessage>,
    namespace_name: String,
    namespace_uid: String,
    db: Arc<dyn DatabaseQueries>,
    status_tick_period: Duration,
) {
    let shared_resource_loop = SharedResourceEventLoop::new(db.clone());

    let workspace_resource_loop = WorkspaceResourceEventLoop::new(
        shared_resource_loop.clone(),
        own_sender.clone(),
        db.clone(),
        &namespace_name,
        &namespace_uid,
    );

    let mut application_event_loops: HashMap<String, ApplicationEventLoop> = HashMap::new();

    while let Some(msg) = receiver.recv().await {
        match msg {
            WorkspaceEventLoopMessage::Event(event) => match event.event_type {
                EventLoopEventType::ManagedEnvironmentModified
                    if event.associated_deployment_name.is_empty() =>
                {
                    workspace_resource_loop.process_managed_environment(event);
                }
                EventLoopEventType::RepositoryCredentialModified => {
                    workspace_resource_loop.process_repository_credential(event);
                }
                EventLoopEventType::DeploymentModified
                | EventLoopEventType::SyncRunModified
                | EventLoopEventType::ManagedEnvironmentModified => {
                    route_event_to_application_event_loop(
                        &mut application_event_loops,
                        event,
                        &namespace_name,
                        &namespace_uid,
                        &db,
                        &shared_resource_loop,
                        &own_sender,
                        status_tick_period,
                    );
                }
            },

            WorkspaceEventLoopMessage::ManagedEnvProcessed(event) => {
                // Fan out to every deployment lane that references the
                // processed environment.
                let deployment_names: Vec<String> =
                    application_event_loops.keys().cloned().collect();

                for deployment_name in deployment_names {
                    let inform = should_inform_gitops_deployment(
                        &db,
                        &event,
                        &deployment_name,
                        &namespace_name,
                        &namespace_uid,
                    )
                    .await
                    .unwrap_or_else(|err| {
                        error!(
                            deployment = %deployment_name,
                            "unable to evaluate managed env fan-out: {}",
                            err
                        );
                        false
                    });

                    if !inform {
                        continue;
                    }

                    debug!(
                        deployment = %deployment_name,
                        environment = %event.request.name,
                        "informing deployment of processed managed environment"
                    );

                    let synthetic = EventLoopEvent {
                        event_type: EventLoopEventType::ManagedEnvironmentModified,
                        request: event.request.clone(),
                        associated_deployment_name: deployment_name.clone(),
                        workspace_id: namespace_uid.clone(),
                        client: event.client.clone(),
                    };
                    route_event_to_application_event_loop(
                        &mut application_event_loops,
                        synthetic,
                        &namespace_name,
                        &namespace_uid,
                        &db,
                        &shared_resource_loop,
                        &own_sender,
                        status_tick_period,
                    );
                }
            }

            WorkspaceEventLoopMessage::ApplicationEventLoopStopped { deployment_name } => {
                debug!(deployment = %deployment_name, "reaping application event loop");
                application_event_loops.remove(&deployment_name);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn route_event_to_application_event_loop(
    application_event_loops: &mut HashMap<String, ApplicationEventLoop>,
    event: EventLoopEvent,
    namespace_name: &str,
    namespace_uid: &str,
    db: &Arc<dyn DatabaseQueries>,
    shared_resource_loop: &SharedResourceEventLoop,
    own_sender: &mpsc::UnboundedSender<WorkspaceEventLoopMessage>,
    status_tick_period: Duration,
) {
    let deployment_name = event.associated_deployment_name.clone();
    if deployment_name.is_empty() {
        error!("SEVERE: deployment event without an associated deployment name");
        return;
    }

    let spawn = |name: &str| {
        ApplicationEventLoop::new(
            name.to_string(),
            namespace_name.to_string(),
            namespace_uid.to_string(),
            db.clone(),
            shared_resource_loop.clone(),
            own_sender.clone(),
            status_tick_period,
        )
    };

    let lane = application_event_loops
        .entry(deployment_name.clone())
        .or_insert_with(|| spawn(&deployment_name));

    if let Err(event) = lane.send(event) {
        // The lane shut down between our map lookup and the send; replace it.
        let fresh = spawn(&deployment_name);
        let _ = fresh.send(event);
        application_event_loops.insert(deployment_name, fresh);
    }
}

/// True when the deployment should learn about a processed managed
/// environment: either its spec names the environment directly, or its
/// Application row currently references the environment's database row.
async fn should_inform_gitops_deployment(
    db: &Arc<dyn DatabaseQueries>,
    event: &EventLoopEvent,
    deployment_name: &str,
    namespace_name: &str,
    namespace_uid: &str,
) -> Result<bool, ReconcileError> {
    if let Some(deployment) = event
        .client
        .get_gitops_deployment(namespace_name, deployment_name)
        .await?
    {
        if deployment.spec.destination.environment == event.request.name
            && event.request.namespace == namespace_name
        {
            return Ok(true);
        }
    }

    let Some(mapping) = db
        .list_deployment_to_application_mappings_by_namespace_and_name(
            deployment_name,
            namespace_name,
            namespace_uid,
        )?
        .into_iter()
        .next()
    else {
        return Ok(false);
    };

    let Some(application) = db.get_application_by_id_unchecked(&mapping.application_id)? else {
        return Ok(false);
    };

    if application.managed_environment_id.is_empty() {
        return Ok(false);
    }

    let Some(env_mapping) = db.get_api_cr_to_database_mapping_for_database_id(
        DB_RELATION_TYPE_MANAGED_ENVIRONMENT,
        &application.managed_environment_id,
    )?
    else {
        return Ok(false);
    };

    Ok(env_mapping.api_resource_name == event.request.name
        && env_mapping.api_resource_namespace == event.request.namespace)
}
