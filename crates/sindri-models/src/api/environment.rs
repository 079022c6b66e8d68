/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Namespace-scoped shared resources: managed environments and repository
//! credentials. Both can be referenced by multiple GitOpsDeployments at once,
//! which is why their reconciliation is serialized through the shared
//! resource loop rather than per-deployment lanes.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// A target cluster, described by an API URL and a Secret holding a
/// kubeconfig for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GitOpsDeploymentManagedEnvironment {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ManagedEnvironmentSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedEnvironmentSpec {
    #[serde(default, rename = "apiURL")]
    pub api_url: String,
    /// Name of the Secret (type managed-environment) holding the kubeconfig.
    #[serde(default)]
    pub cluster_credentials_secret: String,
}

/// Credentials for a private Git repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GitOpsDeploymentRepositoryCredential {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: RepositoryCredentialSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryCredentialSpec {
    /// URL of the repository the credential applies to.
    #[serde(default)]
    pub repository: String,
    /// Name of the Secret holding username/password or an SSH key.
    #[serde(default)]
    pub secret: String,
}
