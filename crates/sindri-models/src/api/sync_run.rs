/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// A user's request to manually sync a GitOpsDeployment to a revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GitOpsDeploymentSyncRun {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GitOpsDeploymentSyncRunSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsDeploymentSyncRunSpec {
    /// Name of the GitOpsDeployment (same namespace) to sync.
    #[serde(default)]
    pub gitops_deployment_name: String,
    /// Revision to sync to.
    #[serde(default, rename = "revisionID")]
    pub revision_id: String,
}

impl GitOpsDeploymentSyncRun {
    /// Webhook validation applied on create.
    pub fn validate_create(&self) -> Result<(), String> {
        super::validate_create_name(self.metadata.name.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_create() {
        let mut run = GitOpsDeploymentSyncRun {
            metadata: ObjectMeta {
                name: Some("my-gitops-depl-sync".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(run.validate_create().is_ok());

        run.metadata.name = Some(super::super::INVALID_SENTINEL_NAME.to_string());
        assert!(run.validate_create().is_err());
    }
}
