/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! One ClusterUser row exists per distinct authenticated identity.
//! Rows are immutable after creation.

use chrono::{DateTime, Utc};
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
#[diesel(table_name = crate::schema::cluster_users)]
#[diesel(primary_key(clusteruser_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClusterUser {
    /// Unique identifier for the cluster user.
    pub clusteruser_id: String,
    /// The authenticated identity this user corresponds to.
    pub user_name: String,
    /// Timestamp when the user row was created.
    pub created_on: DateTime<Utc>,
}

impl ClusterUser {
    /// Creates a new cluster user row with a generated id.
    ///
    /// Returns `Err` if `user_name` is empty.
    pub fn new(user_name: &str) -> Result<Self, String> {
        if user_name.trim().is_empty() {
            return Err("User name cannot be empty".to_string());
        }

        Ok(ClusterUser {
            clusteruser_id: Uuid::new_v4().to_string(),
            user_name: user_name.to_string(),
            created_on: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cluster_user() {
        let user = ClusterUser::new("my-user").unwrap();
        assert_eq!(user.user_name, "my-user");
        assert!(!user.clusteruser_id.is_empty());
    }

    #[test]
    fn test_new_cluster_user_empty_name() {
        let result = ClusterUser::new("  ");
        assert!(result.is_err());
        assert_eq!(result.unwrap_err(), "User name cannot be empty");
    }
}
