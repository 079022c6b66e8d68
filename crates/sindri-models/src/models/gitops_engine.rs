/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! A GitopsEngineCluster is a cluster that hosts one or more GitOps engine
//! installations (Argo-CD-class); a GitopsEngineInstance is a single engine
//! running in a namespace of that cluster. Application rows target an
//! instance, and Operation rows are delivered to the agent watching it.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

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
#[diesel(table_name = crate::schema::gitops_engine_clusters)]
#[diesel(primary_key(gitopsenginecluster_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GitopsEngineCluster {
    pub gitopsenginecluster_id: String,
    pub clustercredentials_id: String,
}

impl GitopsEngineCluster {
    pub fn new(clustercredentials_id: String) -> Self {
        GitopsEngineCluster {
            gitopsenginecluster_id: Uuid::new_v4().to_string(),
            clustercredentials_id,
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
#[diesel(table_name = crate::schema::gitops_engine_instances)]
#[diesel(primary_key(gitopsengineinstance_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GitopsEngineInstance {
    pub gitopsengineinstance_id: String,
    /// Namespace the engine is installed in.
    pub namespace_name: String,
    /// UID of that namespace, to detect delete/recreate.
    pub namespace_uid: String,
    pub enginecluster_id: String,
}

impl GitopsEngineInstance {
    pub fn new(namespace_name: String, namespace_uid: String, enginecluster_id: String) -> Self {
        GitopsEngineInstance {
            gitopsengineinstance_id: Uuid::new_v4().to_string(),
            namespace_name,
            namespace_uid,
            enginecluster_id,
        }
    }
}
