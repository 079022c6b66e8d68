/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The target cluster for deployments. A ManagedEnvironment row is shared:
/// any number of GitOpsDeployments in a namespace may reference it through
/// their `destination.environment` field.
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
#[diesel(table_name = crate::schema::managed_environments)]
#[diesel(primary_key(managedenvironment_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ManagedEnvironment {
    pub managedenvironment_id: String,
    pub name: String,
    /// Credentials used to contact the environment's cluster.
    pub clustercredentials_id: String,
    pub created_on: DateTime<Utc>,
}

impl ManagedEnvironment {
    pub fn new(name: String, clustercredentials_id: String) -> Self {
        ManagedEnvironment {
            managedenvironment_id: Uuid::new_v4().to_string(),
            name,
            clustercredentials_id,
            created_on: Utc::now(),
        }
    }
}
