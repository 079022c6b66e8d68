/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use diesel::prelude::*;
use sindri_models::models::mappings::DB_RELATION_TYPE_MANAGED_ENVIRONMENT;
use sindri_models::models::ManagedEnvironment;
use sindri_models::schema::{api_cr_to_database_mappings, managed_environments};

use crate::dal::{DbResult, DAL};

pub struct ManagedEnvironmentsDAL<'a> {
    pub dal: &'a DAL,
}

impl ManagedEnvironmentsDAL<'_> {
    pub fn create(&self, env: &ManagedEnvironment) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(managed_environments::table)
            .values(env)
            .execute(conn)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> DbResult<Option<ManagedEnvironment>> {
        let conn = &mut self.dal.conn()?;
        Ok(managed_environments::table
            .filter(managed_environments::managedenvironment_id.eq(id))
            .first(conn)
            .optional()?)
    }

    /// Retrieve a managed environment only if it is reachable from the given
    /// namespace through an APICRToDatabaseMapping.
    pub fn get_checked(
        &self,
        id: &str,
        namespace_uid: &str,
    ) -> DbResult<Option<ManagedEnvironment>> {
        let conn = &mut self.dal.conn()?;

        let reachable: i64 = api_cr_to_database_mappings::table
            .filter(
                api_cr_to_database_mappings::db_relation_type
                    .eq(DB_RELATION_TYPE_MANAGED_ENVIRONMENT),
            )
            .filter(api_cr_to_database_mappings::db_relation_key.eq(id))
            .filter(api_cr_to_database_mappings::namespace_uid.eq(namespace_uid))
            .count()
            .get_result(conn)?;

        if reachable == 0 {
            return Ok(None);
        }

        Ok(managed_environments::table
            .filter(managed_environments::managedenvironment_id.eq(id))
            .first(conn)
            .optional()?)
    }

    pub fn update(&self, env: &ManagedEnvironment) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::update(
            managed_environments::table
                .filter(managed_environments::managedenvironment_id.eq(&env.managedenvironment_id)),
        )
        .set(env)
        .execute(conn)?)
    }

    pub fn delete(&self, id: &str) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::delete(
            managed_environments::table.filter(managed_environments::managedenvironment_id.eq(id)),
        )
        .execute(conn)?)
    }
}
