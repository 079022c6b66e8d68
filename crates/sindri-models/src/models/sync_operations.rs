/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! A SyncOperation row records a user's request (via GitOpsDeploymentSyncRun)
//! to manually sync an application to a revision. The cluster agent drives
//! the engine sync and the row's `desired_state` tracks whether the sync
//! should be running or terminated.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SYNC_OPERATION_DESIRED_STATE_RUNNING: &str = "Running";
pub const SYNC_OPERATION_DESIRED_STATE_TERMINATED: &str = "Terminated";

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
#[diesel(table_name = crate::schema::sync_operations)]
#[diesel(primary_key(syncoperation_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SyncOperation {
    pub syncoperation_id: String,
    /// Application the sync targets. Cleared when the application is deleted.
    pub application_id: String,
    /// Name of the GitOpsDeployment the sync run referenced.
    pub deployment_name: String,
    /// Revision requested by the sync run.
    pub revision: String,
    /// Running or Terminated.
    pub desired_state: String,
}

impl SyncOperation {
    pub fn new(application_id: String, deployment_name: String, revision: String) -> Self {
        SyncOperation {
            syncoperation_id: Uuid::new_v4().to_string(),
            application_id,
            deployment_name,
            revision,
            desired_state: SYNC_OPERATION_DESIRED_STATE_RUNNING.to_string(),
        }
    }
}
