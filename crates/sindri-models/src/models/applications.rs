/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Applications Module
//!
//! The Application row is the internal representation of a user's
//! GitOpsDeployment after reconciliation. `spec_field` carries the serialized
//! engine application descriptor that the cluster agent applies to the GitOps
//! engine; the backend compares it against the freshly computed descriptor on
//! every reconcile to decide whether an update (and a new Operation) is
//! required.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix used when naming engine applications after the deployment UID.
pub const APPLICATION_NAME_PREFIX: &str = "gitopsdepl-";

#[derive(
    Queryable,
    Selectable,
    Identifiable,
    Insertable,
    AsChangeset,
    Debug,
    Clone,
    Serialize,
    Deserialize,
    Eq,
    PartialEq,
)]
#[diesel(table_name = crate::schema::applications)]
#[diesel(primary_key(application_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Application {
    /// Unique identifier for the application.
    pub application_id: String,
    /// Name of the application in the GitOps engine namespace.
    pub name: String,
    /// Serialized engine application descriptor (JSON).
    pub spec_field: String,
    /// Engine instance that hosts the application.
    pub engine_instance_inst_id: String,
    /// Target environment; empty string means the deployment's own namespace.
    pub managed_environment_id: String,
    /// Timestamp when the application row was created.
    pub created_on: DateTime<Utc>,
}

impl Application {
    pub fn new(
        name: String,
        spec_field: String,
        engine_instance_inst_id: String,
        managed_environment_id: String,
    ) -> Self {
        Application {
            application_id: Uuid::new_v4().to_string(),
            name,
            spec_field,
            engine_instance_inst_id,
            managed_environment_id,
            created_on: Utc::now(),
        }
    }

    /// The engine application name for a deployment with the given UID.
    pub fn name_for_deployment_uid(deployment_uid: &str) -> String {
        format!("{}{}", APPLICATION_NAME_PREFIX, deployment_uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_for_deployment_uid() {
        assert_eq!(
            Application::name_for_deployment_uid("1234-abcd"),
            "gitopsdepl-1234-abcd"
        );
    }
}
