/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Latest observed status of an Application, written by the cluster agent and
//! read by the deployment status tick. One-to-one with the Application row.
//!
//! The `resources` and `operation_state` columns hold gzip-compressed JSON;
//! `conditions` is a YAML sequence; `reconciled_state` is plain JSON.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

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
    Default,
)]
#[diesel(table_name = crate::schema::application_states)]
#[diesel(primary_key(applicationstate_application_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ApplicationState {
    /// Application this state belongs to (primary key and foreign key).
    pub applicationstate_application_id: String,
    /// Engine health: Healthy, Progressing, Degraded, Suspended, Missing, Unknown.
    pub health: String,
    /// Engine sync status: Synced, OutOfSync, Unknown.
    pub sync_status: String,
    /// Revision the engine last operated on.
    pub revision: String,
    /// Human-readable status message.
    pub message: String,
    /// Gzip-compressed JSON list of per-resource statuses.
    pub resources: Option<Vec<u8>>,
    /// JSON `{source: {...}, destination: {...}}` the engine reconciled to.
    pub reconciled_state: String,
    /// Gzip-compressed JSON of the engine's operation state.
    pub operation_state: Option<Vec<u8>>,
    /// YAML sequence of engine application conditions.
    pub conditions: Option<Vec<u8>>,
}
