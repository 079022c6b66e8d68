/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # API Resource Types
//!
//! Serde representations of the custom resources the backend watches:
//! GitOpsDeployment, GitOpsDeploymentSyncRun, GitOpsDeploymentManagedEnvironment,
//! GitOpsDeploymentRepositoryCredential, and the Operation resource handed to
//! the cluster agent. The backend interacts with the cluster through dynamic
//! objects, so these types only carry `metadata` + `spec` + `status`; group,
//! version and kind live in the constants below.

pub mod conditions;
pub mod deployment;
pub mod environment;
pub mod operation;
pub mod sync_run;

pub use conditions::{
    find_condition, set_condition, GitOpsDeploymentCondition, CONDITION_ERROR_OCCURRED,
    CONDITION_REASON_RECONCILE_ERROR, CONDITION_REASON_RECONCILE_ERROR_RESOLVED,
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_STATUS_UNKNOWN,
};
pub use deployment::{
    ApplicationDestination, ApplicationSource, GitOpsDeployment, GitOpsDeploymentSpec,
    GitOpsDeploymentStatus, HealthStatus, ReconciledDestination, ReconciledSource,
    ReconciledState, ResourceStatus, SyncStatus, DEPLOYMENT_SPEC_TYPE_AUTOMATED,
    DEPLOYMENT_SPEC_TYPE_MANUAL, HEALTH_STATUS_DEGRADED, HEALTH_STATUS_HEALTHY,
    HEALTH_STATUS_MISSING, HEALTH_STATUS_PROGRESSING, HEALTH_STATUS_SUSPENDED,
    HEALTH_STATUS_UNKNOWN, SYNC_STATUS_OUT_OF_SYNC, SYNC_STATUS_SYNCED, SYNC_STATUS_UNKNOWN,
};
pub use environment::{
    GitOpsDeploymentManagedEnvironment, GitOpsDeploymentRepositoryCredential,
    ManagedEnvironmentSpec, RepositoryCredentialSpec,
};
pub use operation::{OperationResource, OperationResourceSpec};
pub use sync_run::{GitOpsDeploymentSyncRun, GitOpsDeploymentSyncRunSpec};

/// API group of all Sindri custom resources.
pub const GROUP: &str = "managed-gitops.sindri.io";

/// API version of all Sindri custom resources.
pub const VERSION: &str = "v1alpha1";

/// Kind names, as they appear in reconcile requests.
pub const KIND_GITOPS_DEPLOYMENT: &str = "GitOpsDeployment";
pub const KIND_SYNC_RUN: &str = "GitOpsDeploymentSyncRun";
pub const KIND_MANAGED_ENVIRONMENT: &str = "GitOpsDeploymentManagedEnvironment";
pub const KIND_REPOSITORY_CREDENTIAL: &str = "GitOpsDeploymentRepositoryCredential";
pub const KIND_OPERATION: &str = "Operation";
pub const KIND_SECRET: &str = "Secret";

/// Secrets of this type carry managed environment credentials.
pub const MANAGED_ENVIRONMENT_SECRET_TYPE: &str = "managed-gitops.sindri.io/managed-environment";

/// Key within a managed environment secret that holds the kubeconfig.
pub const KUBECONFIG_KEY: &str = "kubeconfig";

/// Finalizer that delays deletion of a GitOpsDeployment until its database
/// resources have been cleaned up.
pub const DELETION_FINALIZER: &str = "resources-finalizer.managed-gitops.sindri.io";

/// Maximum length of an object name accepted by the API server.
pub const MAX_NAME_LENGTH: usize = 253;

/// Name reserved for negative testing; creation webhooks reject it.
pub const INVALID_SENTINEL_NAME: &str =
    "zyxwvutsrqponmlkjihgfedcba-abcdefghijklmnoqrstuvwxyz";

/// Rejects names the creation webhook must never admit.
///
/// Shared by the GitOpsDeployment and GitOpsDeploymentSyncRun validators.
pub fn validate_create_name(name: &str) -> Result<(), String> {
    if name == INVALID_SENTINEL_NAME {
        return Err(format!("name should not be {}", INVALID_SENTINEL_NAME));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_create_name_rejects_sentinel() {
        assert!(validate_create_name(INVALID_SENTINEL_NAME).is_err());
    }

    #[test]
    fn test_validate_create_name_accepts_normal_names() {
        assert!(validate_create_name("my-gitops-depl").is_ok());
    }
}
