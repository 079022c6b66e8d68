/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use diesel::prelude::*;
use sindri_models::models::ClusterCredentials;
use sindri_models::schema::cluster_credentials;

use crate::dal::{DbResult, DAL};

pub struct ClusterCredentialsDAL<'a> {
    pub dal: &'a DAL,
}

impl ClusterCredentialsDAL<'_> {
    pub fn create(&self, creds: &ClusterCredentials) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(cluster_credentials::table)
            .values(creds)
            .execute(conn)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> DbResult<Option<ClusterCredentials>> {
        let conn = &mut self.dal.conn()?;
        Ok(cluster_credentials::table
            .filter(cluster_credentials::clustercredentials_cred_id.eq(id))
            .first(conn)
            .optional()?)
    }

    pub fn update(&self, creds: &ClusterCredentials) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::update(
            cluster_credentials::table.filter(
                cluster_credentials::clustercredentials_cred_id
                    .eq(&creds.clustercredentials_cred_id),
            ),
        )
        .set(creds)
        .execute(conn)?)
    }

    pub fn delete(&self, id: &str) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(diesel::delete(
            cluster_credentials::table
                .filter(cluster_credentials::clustercredentials_cred_id.eq(id)),
        )
        .execute(conn)?)
    }
}
