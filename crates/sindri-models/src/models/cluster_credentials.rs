/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Opaque credential bundle for contacting a cluster. Referenced by
//! ManagedEnvironment and GitopsEngineCluster rows; never interpreted by the
//! backend beyond kubeconfig validation at reconcile time.

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
#[diesel(table_name = crate::schema::cluster_credentials)]
#[diesel(primary_key(clustercredentials_cred_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClusterCredentials {
    pub clustercredentials_cred_id: String,
    /// API server URL of the target cluster.
    pub host: String,
    /// Raw kubeconfig contents, if credential access is kubeconfig-based.
    pub kube_config: String,
    /// Context within `kube_config` to use.
    pub kube_config_context: String,
    /// Bearer token, if credential access is service-account-based.
    pub serviceaccount_bearer_token: String,
    /// Namespace of the service account.
    pub serviceaccount_ns: String,
}

impl ClusterCredentials {
    pub fn new(
        host: String,
        kube_config: String,
        kube_config_context: String,
        serviceaccount_bearer_token: String,
        serviceaccount_ns: String,
    ) -> Self {
        ClusterCredentials {
            clustercredentials_cred_id: Uuid::new_v4().to_string(),
            host,
            kube_config,
            kube_config_context,
            serviceaccount_bearer_token,
            serviceaccount_ns,
        }
    }

    /// Whether two credential rows carry the same secret material (ignores id).
    pub fn credentials_equal(&self, other: &ClusterCredentials) -> bool {
        self.host == other.host
            && self.kube_config == other.kube_config
            && self.kube_config_context == other.kube_config_context
            && self.serviceaccount_bearer_token == other.serviceaccount_bearer_token
            && self.serviceaccount_ns == other.serviceaccount_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_equal_ignores_id() {
        let a = ClusterCredentials::new(
            "https://host".into(),
            "kc".into(),
            "ctx".into(),
            "token".into(),
            "ns".into(),
        );
        let mut b = a.clone();
        b.clustercredentials_cred_id = Uuid::new_v4().to_string();
        assert!(a.credentials_equal(&b));

        b.host = "https://other".into();
        assert!(!a.credentials_equal(&b));
    }
}
