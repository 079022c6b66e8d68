/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Operations Module
//!
//! An Operation row is a work item for the downstream cluster agent: it names
//! a database resource (by id and type) whose state the agent should bring to
//! the GitOps engine. The backend creates the row and a matching Operation CR
//! in the engine instance's namespace; the agent claims the CR, performs the
//! work, and updates `state`.
//!
//! ## Status Flow
//!
//! `Waiting` -> `In_Progress` -> `Completed` | `Failed`

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Valid operation states.
pub const OPERATION_STATE_WAITING: &str = "Waiting";
pub const OPERATION_STATE_IN_PROGRESS: &str = "In_Progress";
pub const OPERATION_STATE_COMPLETED: &str = "Completed";
pub const OPERATION_STATE_FAILED: &str = "Failed";

/// Valid operation resource types.
pub const OPERATION_RESOURCE_TYPE_APPLICATION: &str = "Application";
pub const OPERATION_RESOURCE_TYPE_SYNC_OPERATION: &str = "SyncOperation";
pub const OPERATION_RESOURCE_TYPE_MANAGED_ENVIRONMENT: &str = "ManagedEnvironment";
pub const OPERATION_RESOURCE_TYPE_REPOSITORY_CREDENTIAL: &str = "RepositoryCredential";

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
#[diesel(table_name = crate::schema::operations)]
#[diesel(primary_key(operation_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Operation {
    /// Unique identifier for the operation.
    pub operation_id: String,
    /// Engine instance whose agent should process the operation.
    pub instance_id: String,
    /// Id of the database row the operation refers to.
    pub resource_id: String,
    /// Type of that row: Application, SyncOperation, ManagedEnvironment, RepositoryCredential.
    pub resource_type: String,
    /// Cluster user on whose behalf the operation runs.
    pub operation_owner_user_id: String,
    /// Waiting, In_Progress, Completed, or Failed.
    pub state: String,
    /// Human-readable description of the state, set by the agent.
    pub human_readable_state: String,
    pub created_on: DateTime<Utc>,
    pub last_state_update: DateTime<Utc>,
}

impl Operation {
    /// Creates a new operation in the `Waiting` state.
    ///
    /// Returns `Err` if `resource_type` is not one of the known types.
    pub fn new(
        instance_id: String,
        resource_id: String,
        resource_type: &str,
        operation_owner_user_id: String,
    ) -> Result<Self, String> {
        match resource_type {
            OPERATION_RESOURCE_TYPE_APPLICATION
            | OPERATION_RESOURCE_TYPE_SYNC_OPERATION
            | OPERATION_RESOURCE_TYPE_MANAGED_ENVIRONMENT
            | OPERATION_RESOURCE_TYPE_REPOSITORY_CREDENTIAL => {}
            other => return Err(format!("Invalid operation resource type: {}", other)),
        }

        let now = Utc::now();
        Ok(Operation {
            operation_id: Uuid::new_v4().to_string(),
            instance_id,
            resource_id,
            resource_type: resource_type.to_string(),
            operation_owner_user_id,
            state: OPERATION_STATE_WAITING.to_string(),
            human_readable_state: String::new(),
            created_on: now,
            last_state_update: now,
        })
    }
}
