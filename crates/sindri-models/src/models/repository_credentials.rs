/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Credentials for accessing a private Git repository, reconciled from the
//! GitOpsDeploymentRepositoryCredential resource and its referenced Secret.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Queryable,
    Selectable,
    Identifiable,
    Insertable,
    AsChangeset,
    Debug,
    Clone,
    Serialize,
    Deserialize,
    Eq,
    PartialEq,
)]
#[diesel(table_name = crate::schema::repository_credentials)]
#[diesel(primary_key(repositorycredentials_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RepositoryCredential {
    pub repositorycredentials_id: String,
    /// Cluster user that owns the credential.
    pub repo_cred_user_id: String,
    /// URL of the private repository.
    pub private_url: String,
    pub auth_username: Option<String>,
    pub auth_password: Option<String>,
    pub auth_ssh_key: Option<String>,
    /// Name of the Secret the credential was read from.
    pub secret_obj: String,
    /// Engine cluster the credential should be installed on.
    pub engine_cluster_id: String,
}

impl RepositoryCredential {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo_cred_user_id: String,
        private_url: String,
        auth_username: Option<String>,
        auth_password: Option<String>,
        auth_ssh_key: Option<String>,
        secret_obj: String,
        engine_cluster_id: String,
    ) -> Self {
        RepositoryCredential {
            repositorycredentials_id: Uuid::new_v4().to_string(),
            repo_cred_user_id,
            private_url,
            auth_username,
            auth_password,
            auth_ssh_key,
            secret_obj,
            engine_cluster_id,
        }
    }

    /// Whether two credential rows carry the same material (ignores id).
    pub fn credentials_equal(&self, other: &RepositoryCredential) -> bool {
        self.private_url == other.private_url
            && self.auth_username == other.auth_username
            && self.auth_password == other.auth_password
            && self.auth_ssh_key == other.auth_ssh_key
            && self.secret_obj == other.secret_obj
    }
}
