/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Application Event Loop
//!
//! One lane per `(namespace, deployment name)`. The lane consumes an ordered
//! channel of events and drives the runner actions serially; transient system
//! errors are retried in place with exponential backoff, which preserves the
//! at-most-one-writer guarantee for the deployment's rows. A ticker task
//! feeds `StatusTick` messages into the same channel.
//!
//! When the deployment and its rows are gone and the input channel is
//! drained, the lane reports itself stopped to the parent workspace loop and
//! exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info_span, warn, Instrument};

use sindri_utils::backoff::ExponentialBackoff;

use crate::cluster::WorkspaceClient;
use crate::dal::DatabaseQueries;
use crate::errors::ReconcileError;

use super::application_event_runner::{ApplicationEventRunner, DeploymentModifiedResult};
use super::shared_resource_loop::SharedResourceEventLoop;
use super::types::{
    ApplicationEventLoopMessage, EventLoopEvent, EventLoopEventType, WorkspaceEventLoopMessage,
};

pub(crate) struct ApplicationEventLoop {
    sender: mpsc::UnboundedSender<ApplicationEventLoopMessage>,
}

impl ApplicationEventLoop {
    pub(crate) fn new(
        deployment_name: String,
        namespace_name: String,
        workspace_id: String,
        db: Arc<dyn DatabaseQueries>,
        shared_resource_loop: SharedResourceEventLoop,
        parent: mpsc::UnboundedSender<WorkspaceEventLoopMessage>,
        status_tick_period: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        let span = info_span!(
            "application_event_loop",
            namespace = %namespace_name,
            name = %deployment_name,
        );
        tokio::spawn(
            internal_application_event_loop(
                receiver,
                deployment_name,
                namespace_name,
                workspace_id,
                db,
                shared_resource_loop,
                parent,
            )
            .instrument(span),
        );

        start_status_ticker(sender.clone(), status_tick_period);

        ApplicationEventLoop { sender }
    }

    /// Enqueues an event. Fails when the lane has already shut down; the
    /// caller respawns the lane and resends.
    pub(crate) fn send(&self, event: EventLoopEvent) -> Result<(), EventLoopEvent> {
        self.sender
            .send(ApplicationEventLoopMessage::Event(event))
            .map_err(|e| match e.0 {
                ApplicationEventLoopMessage::Event(event) => event,
                ApplicationEventLoopMessage::StatusTick => unreachable!(),
            })
    }
}

fn start_status_ticker(
    sender: mpsc::UnboundedSender<ApplicationEventLoopMessage>,
    period: Duration,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            if sender.send(ApplicationEventLoopMessage::StatusTick).is_err() {
                break;
            }
        }
    });
}

async fn internal_application_event_loop(
    mut receiver: mpsc::UnboundedReceiver<ApplicationEventLoopMessage>,
    deployment_name: String,
    namespace_name: String,
    workspace_id: String,
    db: Arc<dyn DatabaseQueries>,
    shared_resource_loop: SharedResourceEventLoop,
    parent: mpsc::UnboundedSender<WorkspaceEventLoopMessage>,
) {
    // Ticks can only be serviced once an event has carried in a client.
    let mut workspace_client: Option<Arc<dyn WorkspaceClient>> = None;

    while let Some(msg) = receiver.recv().await {
        match msg {
            ApplicationEventLoopMessage::Event(event) => {
                workspace_client = Some(event.client.clone());

                let runner = runner_for_event(
                    &event,
                    &deployment_name,
                    &namespace_name,
                    &workspace_id,
                    &db,
                    &shared_resource_loop,
                );

                let can_shutdown = process_event(&runner, &event, &deployment_name).await;

                if can_shutdown && receiver.is_empty() {
                    let _ = parent.send(WorkspaceEventLoopMessage::ApplicationEventLoopStopped {
                        deployment_name: deployment_name.clone(),
                    });
                    return;
                }
            }
            ApplicationEventLoopMessage::StatusTick => {
                let Some(client) = workspace_client.clone() else {
                    continue;
                };
                let runner = ApplicationEventRunner {
                    event_resource_name: deployment_name.clone(),
                    event_resource_namespace: namespace_name.clone(),
                    workspace_client: client,
                    shared_resource_loop: shared_resource_loop.clone(),
                    workspace_id: workspace_id.clone(),
                    db: db.clone(),
                };
                if let Err(err) = runner
                    .handle_update_deployment_status_tick(&deployment_name, &namespace_name)
                    .await
                {
                    error!("unable to update deployment status: {}", err);
                }
            }
        }
    }
}

fn runner_for_event(
    event: &EventLoopEvent,
    deployment_name: &str,
    namespace_name: &str,
    workspace_id: &str,
    db: &Arc<dyn DatabaseQueries>,
    shared_resource_loop: &SharedResourceEventLoop,
) -> ApplicationEventRunner {
    // Sync run events name the sync run resource; everything else acts on
    // the deployment itself.
    let event_resource_name = match event.event_type {
        EventLoopEventType::SyncRunModified => event.request.name.clone(),
        _ => deployment_name.to_string(),
    };

    ApplicationEventRunner {
        event_resource_name,
        event_resource_namespace: namespace_name.to_string(),
        workspace_client: event.client.clone(),
        shared_resource_loop: shared_resource_loop.clone(),
        workspace_id: workspace_id.to_string(),
        db: db.clone(),
    }
}

/// Runs one event to completion, retrying transient system errors with
/// backoff. Returns whether the lane may shut down.
async fn process_event(
    runner: &ApplicationEventRunner,
    event: &EventLoopEvent,
    deployment_name: &str,
) -> bool {
    match event.event_type {
        EventLoopEventType::DeploymentModified
        | EventLoopEventType::ManagedEnvironmentModified => {
            let result =
                run_with_retry(deployment_name, || runner.handle_deployment_modified()).await;
            matches!(
                result,
                Ok(DeploymentModifiedResult::Deleted) | Ok(DeploymentModifiedResult::Missing)
            )
        }
        EventLoopEventType::SyncRunModified => {
            let _ = run_with_retry(deployment_name, || runner.handle_sync_run_modified()).await;
            false
        }
        EventLoopEventType::RepositoryCredentialModified => {
            // Repository credentials are workspace-scoped; they never route
            // to a deployment lane.
            error!("SEVERE: repository credential event on an application event loop");
            false
        }
    }
}

async fn run_with_retry<T, F, Fut>(deployment_name: &str, mut action: F) -> Result<T, ReconcileError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ReconcileError>>,
{
    let mut backoff = ExponentialBackoff::default_policy();

    loop {
        match action().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                let delay = backoff.increase_and_return_new_duration();
                warn!(
                    deployment = %deployment_name,
                    ?delay,
                    "transient error handling event, retrying: {}",
                    err
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_user_error() {
                    warn!(deployment = %deployment_name, "user error handling event: {}", err);
                } else {
                    error!(deployment = %deployment_name, "unable to handle event: {}", err);
                }
                return Err(err);
            }
        }
    }
}
