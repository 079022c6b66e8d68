/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use diesel::prelude::*;
use sindri_models::models::Application;
use sindri_models::schema::{applications, deployment_to_application_mappings};

use crate::dal::{DbResult, DAL};

pub struct ApplicationsDAL<'a> {
    pub dal: &'a DAL,
}

impl ApplicationsDAL<'_> {
    pub fn create(&self, app: &Application) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(applications::table)
            .values(app)
            .execute(conn)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> DbResult<Option<Application>> {
        let conn = &mut self.dal.conn()?;
        Ok(applications::table
            .filter(applications::application_id.eq(id))
            .first(conn)
            .optional()?)
    }

    /// Retrieve an application only if it is reachable from the given
    /// namespace through a DeploymentToApplicationMapping.
    pub fn get_checked(&self, id: &str, namespace_uid: &str) -> DbResult<Option<Application>> {
        let conn = &mut self.dal.conn()?;

        let reachable: i64 = deployment_to_application_mappings::table
            .filter(deployment_to_application_mappings::application_id.eq(id))
            .filter(deployment_to_application_mappings::namespace_uid.eq(namespace_uid))
            .count()
            .get_result(conn)?;

        if reachable == 0 {
            return Ok(None);
        }

        Ok(applications::table
            .filter(applications::application_id.eq(id))
            .first(conn)
            .optional()?)
    }

    pub fn update(&self, app: &Application) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::update(
            applications::table.filter(applications::application_id.eq(&app.application_id)),
        )
        .set(app)
        .execute(conn)?)
    }

    pub fn delete(&self, id: &str) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(
            diesel::delete(applications::table.filter(applications::application_id.eq(id)))
                .execute(conn)?,
        )
    }

    /// List every application. No row-level authorization filter.
    pub fn list_all(&self) -> DbResult<Vec<Application>> {
        let conn = &mut self.dal.conn()?;
        Ok(applications::table
            .order(applications::created_on.asc())
            .load(conn)?)
    }
}
