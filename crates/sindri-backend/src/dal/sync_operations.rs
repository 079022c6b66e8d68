/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use diesel::prelude::*;
use sindri_models::models::SyncOperation;
use sindri_models::schema::sync_operations;

use crate::dal::{DbResult, DAL};

pub struct SyncOperationsDAL<'a> {
    pub dal: &'a DAL,
}

impl SyncOperationsDAL<'_> {
    pub fn create(&self, sync_operation: &SyncOperation) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(sync_operations::table)
            .values(sync_operation)
            .execute(conn)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> DbResult<Option<SyncOperation>> {
        let conn = &mut self.dal.conn()?;
        Ok(sync_operations::table
            .filter(sync_operations::syncoperation_id.eq(id))
            .first(conn)
            .optional()?)
    }

    pub fn list_by_application_id(&self, application_id: &str) -> DbResult<Vec<SyncOperation>> {
        let conn = &mut self.dal.conn()?;
        Ok(sync_operations::table
            .filter(sync_operations::application_id.eq(application_id))
            .load(conn)?)
    }

    pub fn update(&self, sync_operation: &SyncOperation) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::update(
            sync_operations::table
                .filter(sync_operations::syncoperation_id.eq(&sync_operation.syncoperation_id)),
        )
        .set(sync_operation)
        .execute(conn)?)
    }

    pub fn delete(&self, id: &str) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(
            diesel::delete(sync_operations::table.filter(sync_operations::syncoperation_id.eq(id)))
                .execute(conn)?,
        )
    }
}
