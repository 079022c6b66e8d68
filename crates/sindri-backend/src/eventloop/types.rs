/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Message types carried between the event loop lanes. Payloads are tagged
//! enums; a lane that receives a variant it does not handle treats it as a
//! severe error rather than guessing.

use std::fmt;
use std::sync::Arc;

use crate::cluster::WorkspaceClient;

/// Identity of the API resource a reconcile request names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRequest {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// What happened, from the perspective of the per-deployment lane. The
/// status reconciliation tick is not an event; each lane's ticker delivers
/// it as [`ApplicationEventLoopMessage::StatusTick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLoopEventType {
    DeploymentModified,
    SyncRunModified,
    /// A shared managed environment this deployment references was
    /// reconciled; re-run the deployment handler.
    ManagedEnvironmentModified,
    RepositoryCredentialModified,
}

/// One event flowing through the hierarchy.
#[derive(Clone)]
pub struct EventLoopEvent {
    pub event_type: EventLoopEventType,
    /// The resource the raw reconcile request named.
    pub request: ResourceRequest,
    /// The GitOpsDeployment lane the event routes to. Empty for events that
    /// target the workspace resource loop instead of a deployment lane.
    pub associated_deployment_name: String,
    /// UID of the namespace (the workspace identity).
    pub workspace_id: String,
    /// Client scoped to the API namespace the event came from.
    pub client: Arc<dyn WorkspaceClient>,
}

impl fmt::Debug for EventLoopEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoopEvent")
            .field("event_type", &self.event_type)
            .field("request", &self.request)
            .field(
                "associated_deployment_name",
                &self.associated_deployment_name,
            )
            .field("workspace_id", &self.workspace_id)
            .finish()
    }
}

/// Messages accepted by a workspace event loop.
#[derive(Debug)]
pub enum WorkspaceEventLoopMessage {
    /// An event routed from the preprocess loop.
    Event(EventLoopEvent),
    /// A managed environment finished reconciling; fan out to dependent
    /// deployment lanes.
    ManagedEnvProcessed(EventLoopEvent),
    /// A deployment lane drained its input and shut down.
    ApplicationEventLoopStopped { deployment_name: String },
}

/// Messages accepted by a per-deployment application event loop.
#[derive(Debug)]
pub enum ApplicationEventLoopMessage {
    Event(EventLoopEvent),
    StatusTick,
}
