/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! The GitOpsDeployment resource: user-authored deployment intent pointing a
//! Git source at a destination environment.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use super::conditions::GitOpsDeploymentCondition;

/// Sync policy values for `spec.type`.
pub const DEPLOYMENT_SPEC_TYPE_AUTOMATED: &str = "automated";
pub const DEPLOYMENT_SPEC_TYPE_MANUAL: &str = "manual";

/// Engine health codes surfaced on `.status.health.status`.
pub const HEALTH_STATUS_HEALTHY: &str = "Healthy";
pub const HEALTH_STATUS_PROGRESSING: &str = "Progressing";
pub const HEALTH_STATUS_DEGRADED: &str = "Degraded";
pub const HEALTH_STATUS_SUSPENDED: &str = "Suspended";
pub const HEALTH_STATUS_MISSING: &str = "Missing";
pub const HEALTH_STATUS_UNKNOWN: &str = "Unknown";

/// Engine sync codes surfaced on `.status.sync.status`.
pub const SYNC_STATUS_SYNCED: &str = "Synced";
pub const SYNC_STATUS_OUT_OF_SYNC: &str = "OutOfSync";
pub const SYNC_STATUS_UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GitOpsDeployment {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GitOpsDeploymentSpec,
    #[serde(default)]
    pub status: GitOpsDeploymentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsDeploymentSpec {
    #[serde(default)]
    pub source: ApplicationSource,
    #[serde(default)]
    pub destination: ApplicationDestination,
    /// "automated" or "manual"; anything else is treated as manual.
    #[serde(default, rename = "type")]
    pub spec_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    /// URL of the Git repository.
    #[serde(default, rename = "repoURL")]
    pub repo_url: String,
    /// Directory path within the repository.
    #[serde(default)]
    pub path: String,
    /// Commit, tag, or branch to deploy from.
    #[serde(default)]
    pub target_revision: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDestination {
    /// Name of a GitOpsDeploymentManagedEnvironment in the same namespace.
    /// Empty means the deployment targets its own namespace.
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsDeploymentStatus {
    #[serde(default)]
    pub health: HealthStatus,
    #[serde(default)]
    pub sync: SyncStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<GitOpsDeploymentCondition>,
    #[serde(default)]
    pub reconciled_state: ReconciledState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_state: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revision: String,
}

/// The source/destination the engine last reconciled, mirrored from the
/// `reconciled_state` column of ApplicationState. Wire format is fixed by the
/// cluster agent: JSON with camelCase fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledState {
    #[serde(default)]
    pub source: ReconciledSource,
    #[serde(default)]
    pub destination: ReconciledDestination,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledSource {
    #[serde(default, rename = "repoURL")]
    pub repo_url: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub target_revision: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledDestination {
    #[serde(default)]
    pub namespace: String,
    /// Name of the managed environment resource the engine deployed to.
    /// Resolved from the database row id by the status tick.
    #[serde(default)]
    pub name: String,
}

/// Status of one Kubernetes resource managed by the engine application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthStatus>,
}

impl GitOpsDeployment {
    /// Webhook validation applied on create.
    pub fn validate_create(&self) -> Result<(), String> {
        super::validate_create_name(self.metadata.name.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_round_trips_camel_case() {
        let spec = GitOpsDeploymentSpec {
            source: ApplicationSource {
                repo_url: "https://github.com/test/test".into(),
                path: "environments/overlays/dev".into(),
                target_revision: "HEAD".into(),
            },
            destination: ApplicationDestination {
                environment: "my-managed-env".into(),
                namespace: "jane".into(),
            },
            spec_type: DEPLOYMENT_SPEC_TYPE_AUTOMATED.into(),
        };

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["source"]["repoURL"], "https://github.com/test/test");
        assert_eq!(value["source"]["targetRevision"], "HEAD");
        assert_eq!(value["destination"]["environment"], "my-managed-env");
        assert_eq!(value["type"], "automated");

        let back: GitOpsDeploymentSpec = serde_json::from_value(value).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_reconciled_state_wire_format() {
        let json = r#"{
            "source": {"repoURL": "https://github.com/abc-org/abc-repo", "path": "/abc-path", "targetRevision": "abc-commit"},
            "destination": {"namespace": "abc-namespace", "name": "managed-env-row-id"}
        }"#;

        let state: ReconciledState = serde_json::from_str(json).unwrap();
        assert_eq!(state.source.repo_url, "https://github.com/abc-org/abc-repo");
        assert_eq!(state.source.target_revision, "abc-commit");
        assert_eq!(state.destination.name, "managed-env-row-id");
    }

    #[test]
    fn test_validate_create_rejects_sentinel_name() {
        let depl = GitOpsDeployment {
            metadata: ObjectMeta {
                name: Some(super::super::INVALID_SENTINEL_NAME.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(depl.validate_create().is_err());
    }
}
