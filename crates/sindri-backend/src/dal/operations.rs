/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use diesel::prelude::*;
use sindri_models::models::Operation;
use sindri_models::schema::operations;

use crate::dal::{DbResult, DAL};

pub struct OperationsDAL<'a> {
    pub dal: &'a DAL,
}

impl OperationsDAL<'_> {
    pub fn create(&self, operation: &Operation) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(operations::table)
            .values(operation)
            .execute(conn)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> DbResult<Option<Operation>> {
        let conn = &mut self.dal.conn()?;
        Ok(operations::table
            .filter(operations::operation_id.eq(id))
            .first(conn)
            .optional()?)
    }

    /// Operations referring to a database row, oldest first.
    pub fn list_by_resource(
        &self,
        resource_id: &str,
        resource_type: &str,
    ) -> DbResult<Vec<Operation>> {
        let conn = &mut self.dal.conn()?;
        Ok(operations::table
            .filter(operations::resource_id.eq(resource_id))
            .filter(operations::resource_type.eq(resource_type))
            .order(operations::created_on.asc())
            .load(conn)?)
    }

    pub fn update(&self, operation: &Operation) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::update(
            operations::table.filter(operations::operation_id.eq(&operation.operation_id)),
        )
        .set(operation)
        .execute(conn)?)
    }

    pub fn delete(&self, id: &str) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(
            diesel::delete(operations::table.filter(operations::operation_id.eq(id)))
                .execute(conn)?,
        )
    }
}
