/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Mappings Module
//!
//! Two binding tables connect API custom resources to database rows:
//!
//! - `DeploymentToApplicationMapping` binds one GitOpsDeployment identity
//!   (name, namespace, namespace UID) to its internal Application row.
//! - `APICRToDatabaseMapping` is the generic binding from any API resource
//!   identity to any database row, keyed by resource type + UID + relation
//!   type. At most one mapping exists per such triple.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// API resource types that can appear in an APICRToDatabaseMapping.
pub const API_RESOURCE_TYPE_MANAGED_ENVIRONMENT: &str = "GitOpsDeploymentManagedEnvironment";
pub const API_RESOURCE_TYPE_SYNC_RUN: &str = "GitOpsDeploymentSyncRun";
pub const API_RESOURCE_TYPE_REPOSITORY_CREDENTIAL: &str = "GitOpsDeploymentRepositoryCredential";

/// Database relation types that can appear in an APICRToDatabaseMapping.
pub const DB_RELATION_TYPE_MANAGED_ENVIRONMENT: &str = "ManagedEnvironment";
pub const DB_RELATION_TYPE_SYNC_OPERATION: &str = "SyncOperation";
pub const DB_RELATION_TYPE_REPOSITORY_CREDENTIAL: &str = "RepositoryCredential";

#[derive(
    Queryable,
    Selectable,
    Identifiable,
    Insertable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
    Eq,
    PartialEq,
)]
#[diesel(table_name = crate::schema::deployment_to_application_mappings)]
#[diesel(primary_key(deploymenttoapplicationmapping_uid_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeploymentToApplicationMapping {
    /// UID of the GitOpsDeployment resource.
    pub deploymenttoapplicationmapping_uid_id: String,
    pub deployment_name: String,
    pub deployment_namespace: String,
    /// UID of the namespace containing the deployment.
    pub namespace_uid: String,
    /// The Application row the deployment reconciles to.
    pub application_id: String,
}

impl DeploymentToApplicationMapping {
    pub fn new(
        deployment_uid: String,
        deployment_name: String,
        deployment_namespace: String,
        namespace_uid: String,
        application_id: String,
    ) -> Self {
        DeploymentToApplicationMapping {
            deploymenttoapplicationmapping_uid_id: deployment_uid,
            deployment_name,
            deployment_namespace,
            namespace_uid,
            application_id,
        }
    }
}

#[derive(
    Queryable,
    Selectable,
    Identifiable,
    Insertable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
    Eq,
    PartialEq,
)]
#[diesel(table_name = crate::schema::api_cr_to_database_mappings)]
#[diesel(primary_key(api_resource_type, api_resource_uid, db_relation_type))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct APICRToDatabaseMapping {
    pub api_resource_type: String,
    pub api_resource_uid: String,
    pub api_resource_name: String,
    pub api_resource_namespace: String,
    pub namespace_uid: String,
    pub db_relation_type: String,
    pub db_relation_key: String,
}
