/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Cluster Client Seam
//!
//! The event loops never talk to the API server directly; they depend on the
//! [`WorkspaceClient`] trait, which exposes exactly the object operations the
//! reconcilers need. [`kube_client::KubeWorkspaceClient`] backs it with the
//! live cluster; [`fake::FakeWorkspaceClient`] is the in-memory double used
//! by tests, including resource-version conflict injection for exercising
//! optimistic-concurrency retries.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};

use sindri_models::api::{
    GitOpsDeployment, GitOpsDeploymentManagedEnvironment, GitOpsDeploymentRepositoryCredential,
    GitOpsDeploymentSyncRun, OperationResource,
};

pub mod fake;
pub mod kube_client;

/// Errors surfaced by cluster access.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// The object changed between read and write (HTTP 409). Callers doing
    /// read-modify-write re-read and retry.
    #[error("conflict writing {0}")]
    Conflict(String),

    /// Any other API server failure; transient from the core's perspective.
    #[error("cluster api error: {0}")]
    Api(String),
}

impl ClusterError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict(_))
    }

    pub fn is_retryable(&self) -> bool {
        // Conflicts are handled by bounded re-read loops at the call site;
        // if one escapes, retrying the whole task is still the right move.
        true
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;

/// Typed access to the objects in an API namespace, plus Operation resources
/// in engine namespaces. Getters return `Ok(None)` for missing objects.
#[async_trait]
pub trait WorkspaceClient: Send + Sync {
    async fn get_namespace(&self, name: &str) -> ClusterResult<Option<Namespace>>;

    async fn get_secret(&self, namespace: &str, name: &str) -> ClusterResult<Option<Secret>>;

    async fn get_gitops_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeployment>>;

    /// Replaces the object (metadata + spec). Fails with
    /// [`ClusterError::Conflict`] when the stored resource version differs
    /// from the one in `deployment`.
    async fn update_gitops_deployment(&self, deployment: &GitOpsDeployment) -> ClusterResult<()>;

    /// Replaces only the status subresource.
    async fn update_gitops_deployment_status(
        &self,
        deployment: &GitOpsDeployment,
    ) -> ClusterResult<()>;

    async fn get_sync_run(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeploymentSyncRun>>;

    async fn get_managed_environment(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeploymentManagedEnvironment>>;

    /// All managed environment resources in a namespace; used to resolve
    /// which environments reference a changed Secret.
    async fn list_managed_environments(
        &self,
        namespace: &str,
    ) -> ClusterResult<Vec<GitOpsDeploymentManagedEnvironment>>;

    async fn get_repository_credential(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeploymentRepositoryCredential>>;

    async fn create_operation_resource(
        &self,
        namespace: &str,
        operation: &OperationResource,
    ) -> ClusterResult<()>;

    /// Deleting a missing Operation resource is not an error.
    async fn delete_operation_resource(&self, namespace: &str, name: &str) -> ClusterResult<()>;
}
