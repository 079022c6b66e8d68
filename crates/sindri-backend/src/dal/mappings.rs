/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for the two binding tables.
//!
//! DeploymentToApplicationMapping rows are keyed by the GitOpsDeployment UID;
//! APICRToDatabaseMapping rows are keyed by the
//! (resource type, resource UID, relation type) triple.

use diesel::prelude::*;
use sindri_models::models::{APICRToDatabaseMapping, DeploymentToApplicationMapping};
use sindri_models::schema::{api_cr_to_database_mappings, deployment_to_application_mappings};

use crate::dal::{DbResult, DAL};

pub struct MappingsDAL<'a> {
    pub dal: &'a DAL,
}

impl MappingsDAL<'_> {
    pub fn create_deployment_mapping(
        &self,
        mapping: &DeploymentToApplicationMapping,
    ) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(deployment_to_application_mappings::table)
            .values(mapping)
            .execute(conn)?;
        Ok(())
    }

    pub fn get_deployment_mapping(
        &self,
        deployment_uid: &str,
    ) -> DbResult<Option<DeploymentToApplicationMapping>> {
        let conn = &mut self.dal.conn()?;
        Ok(deployment_to_application_mappings::table
            .filter(
                deployment_to_application_mappings::deploymenttoapplicationmapping_uid_id
                    .eq(deployment_uid),
            )
            .first(conn)
            .optional()?)
    }

    pub fn list_deployment_mappings_by_namespace_and_name(
        &self,
        deployment_name: &str,
        deployment_namespace: &str,
        namespace_uid: &str,
    ) -> DbResult<Vec<DeploymentToApplicationMapping>> {
        let conn = &mut self.dal.conn()?;
        Ok(deployment_to_application_mappings::table
            .filter(deployment_to_application_mappings::deployment_name.eq(deployment_name))
            .filter(
                deployment_to_application_mappings::deployment_namespace.eq(deployment_namespace),
            )
            .filter(deployment_to_application_mappings::namespace_uid.eq(namespace_uid))
            .load(conn)?)
    }

    pub fn delete_deployment_mapping(&self, deployment_uid: &str) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::delete(
            deployment_to_application_mappings::table.filter(
                deployment_to_application_mappings::deploymenttoapplicationmapping_uid_id
                    .eq(deployment_uid),
            ),
        )
        .execute(conn)?)
    }

    pub fn create_api_cr_mapping(&self, mapping: &APICRToDatabaseMapping) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(api_cr_to_database_mappings::table)
            .values(mapping)
            .execute(conn)?;
        Ok(())
    }

    pub fn get_api_cr_mapping(
        &self,
        api_resource_type: &str,
        api_resource_uid: &str,
        db_relation_type: &str,
    ) -> DbResult<Option<APICRToDatabaseMapping>> {
        let conn = &mut self.dal.conn()?;
        Ok(api_cr_to_database_mappings::table
            .filter(api_cr_to_database_mappings::api_resource_type.eq(api_resource_type))
            .filter(api_cr_to_database_mappings::api_resource_uid.eq(api_resource_uid))
            .filter(api_cr_to_database_mappings::db_relation_type.eq(db_relation_type))
            .first(conn)
            .optional()?)
    }

    /// Mappings for an API resource identified by name rather than UID, used
    /// when the resource itself has been deleted from the cluster.
    pub fn list_api_cr_mappings_for_api_resource(
        &self,
        api_resource_type: &str,
        api_resource_name: &str,
        api_resource_namespace: &str,
        namespace_uid: &str,
    ) -> DbResult<Vec<APICRToDatabaseMapping>> {
        let conn = &mut self.dal.conn()?;
        Ok(api_cr_to_database_mappings::table
            .filter(api_cr_to_database_mappings::api_resource_type.eq(api_resource_type))
            .filter(api_cr_to_database_mappings::api_resource_name.eq(api_resource_name))
            .filter(api_cr_to_database_mappings::api_resource_namespace.eq(api_resource_namespace))
            .filter(api_cr_to_database_mappings::namespace_uid.eq(namespace_uid))
            .load(conn)?)
    }

    pub fn get_api_cr_mapping_for_database_id(
        &self,
        db_relation_type: &str,
        db_relation_key: &str,
    ) -> DbResult<Option<APICRToDatabaseMapping>> {
        let conn = &mut self.dal.conn()?;
        Ok(api_cr_to_database_mappings::table
            .filter(api_cr_to_database_mappings::db_relation_type.eq(db_relation_type))
            .filter(api_cr_to_database_mappings::db_relation_key.eq(db_relation_key))
            .first(conn)
            .optional()?)
    }

    pub fn delete_api_cr_mapping(&self, mapping: &APICRToDatabaseMapping) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::delete(
            api_cr_to_database_mappings::table
                .filter(
                    api_cr_to_database_mappings::api_resource_type.eq(&mapping.api_resource_type),
                )
                .filter(api_cr_to_database_mappings::api_resource_uid.eq(&mapping.api_resource_uid))
                .filter(
                    api_cr_to_database_mappings::db_relation_type.eq(&mapping.db_relation_type),
                ),
        )
        .execute(conn)?)
    }
}
