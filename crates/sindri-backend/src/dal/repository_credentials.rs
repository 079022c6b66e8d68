/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use diesel::prelude::*;
use sindri_models::models::RepositoryCredential;
use sindri_models::schema::repository_credentials;

use crate::dal::{DbResult, DAL};

pub struct RepositoryCredentialsDAL<'a> {
    pub dal: &'a DAL,
}

impl RepositoryCredentialsDAL<'_> {
    pub fn create(&self, credential: &RepositoryCredential) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(repository_credentials::table)
            .values(credential)
            .execute(conn)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> DbResult<Option<RepositoryCredential>> {
        let conn = &mut self.dal.conn()?;
        Ok(repository_credentials::table
            .filter(repository_credentials::repositorycredentials_id.eq(id))
            .first(conn)
            .optional()?)
    }

    pub fn update(&self, credential: &RepositoryCredential) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::update(
            repository_credentials::table.filter(
                repository_credentials::repositorycredentials_id
                    .eq(&credential.repositorycredentials_id),
            ),
        )
        .set(credential)
        .execute(conn)?)
    }

    pub fn delete(&self, id: &str) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::delete(
            repository_credentials::table
                .filter(repository_credentials::repositorycredentials_id.eq(id)),
        )
        .execute(conn)?)
    }
}
