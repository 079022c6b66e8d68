/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use diesel::prelude::*;
use sindri_models::models::ClusterUser;
use sindri_models::schema::cluster_users;

use crate::dal::{DbResult, DAL};

pub struct ClusterUsersDAL<'a> {
    pub dal: &'a DAL,
}

impl ClusterUsersDAL<'_> {
    /// Create a new cluster user in the database
    pub fn create(&self, user: &ClusterUser) -> DbResult<()> {
        let conn = &mut self.dal.conn()?;
        diesel::insert_into(cluster_users::table)
            .values(user)
            .execute(conn)?;
        Ok(())
    }

    /// Retrieve a cluster user by its id
    pub fn get(&self, id: &str) -> DbResult<Option<ClusterUser>> {
        let conn = &mut self.dal.conn()?;
        Ok(cluster_users::table
            .filter(cluster_users::clusteruser_id.eq(id))
            .first(conn)
            .optional()?)
    }

    /// Retrieve a cluster user by its user name
    pub fn get_by_user_name(&self, user_name: &str) -> DbResult<Option<ClusterUser>> {
        let conn = &mut self.dal.conn()?;
        Ok(cluster_users::table
            .filter(cluster_users::user_name.eq(user_name))
            .first(conn)
            .optional()?)
    }

    /// Delete a cluster user, returning the number of rows affected
    pub fn delete(&self, id: &str) -> DbResult<usize> {
        let conn = &mut self.dal.conn()?;
        Ok(
            diesel::delete(cluster_users::table.filter(cluster_users::clusteruser_id.eq(id)))
                .execute(conn)?,
        )
    }
}
