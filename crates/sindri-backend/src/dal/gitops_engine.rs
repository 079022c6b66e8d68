/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use diesel::prelude::*;
use sindri_models::models::{GitopsEngineCluster, GitopsEngineInstance};
use sindri_models::schema::{gitops_engine_clusters, gitops_engine_instances};

use crate::dal::{DbResult, DAL};

pub struct GitopsEngineDAL<'a> {
    pub dal: &'a DAL,
}

impl GitopsEngineDAL<'_> {
    pub fn create_cluster(&self, cluster: &GitopsEngineCluster) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(gitops_engine_clusters::table)
            .values(cluster)
            .execute(conn)?;
        Ok(())
    }

    pub fn get_cluster(&self, id: &str) -> DbResult<Option<GitopsEngineCluster>> {
        let conn = &mut self.dal.conn()?;
        Ok(gitops_engine_clusters::table
            .filter(gitops_engine_clusters::gitopsenginecluster_id.eq(id))
            .first(conn)
            .optional()?)
    }

    /// List every engine cluster. No row-level authorization filter.
    pub fn list_all_clusters(&self) -> DbResult<Vec<GitopsEngineCluster>> {
        let conn = &mut self.dal.conn()?;
        Ok(gitops_engine_clusters::table.load(conn)?)
    }

    pub fn create_instance(&self, instance: &GitopsEngineInstance) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(gitops_engine_instances::table)
            .values(instance)
            .execute(conn)?;
        Ok(())
    }

    pub fn get_instance(&self, id: &str) -> DbResult<Option<GitopsEngineInstance>> {
        let conn = &mut self.dal.conn()?;
        Ok(gitops_engine_instances::table
            .filter(gitops_engine_instances::gitopsengineinstance_id.eq(id))
            .first(conn)
            .optional()?)
    }

    pub fn list_instances_by_namespace_uid(
        &self,
        namespace_uid: &str,
    ) -> DbResult<Vec<GitopsEngineInstance>> {
        let conn = &mut self.dal.conn()?;
        Ok(gitops_engine_instances::table
            .filter(gitops_engine_instances::namespace_uid.eq(namespace_uid))
            .load(conn)?)
    }
}
