/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! HashMap-backed implementation of [`DatabaseQueries`], used by tests and
//! for running the backend locally without Postgres. Not durable.

use std::collections::HashMap;
use std::sync::Mutex;

use sindri_models::models::mappings::{
    DB_RELATION_TYPE_MANAGED_ENVIRONMENT,
};
use sindri_models::models::{
    APICRToDatabaseMapping, Application, ApplicationState, ClusterCredentials, ClusterUser,
    DeploymentToApplicationMapping, GitopsEngineCluster, GitopsEngineInstance, ManagedEnvironment,
    Operation, RepositoryCredential, SyncOperation,
};

use super::{DatabaseQueries, DbResult};

#[derive(Default)]
struct Tables {
    cluster_users: HashMap<String, ClusterUser>,
    cluster_credentials: HashMap<String, ClusterCredentials>,
    managed_environments: HashMap<String, ManagedEnvironment>,
    gitops_engine_clusters: HashMap<String, GitopsEngineCluster>,
    gitops_engine_instances: HashMap<String, GitopsEngineInstance>,
    applications: HashMap<String, Application>,
    application_states: HashMap<String, ApplicationState>,
    deployment_mappings: HashMap<String, DeploymentToApplicationMapping>,
    // Keyed by (api_resource_type, api_resource_uid, db_relation_type).
    api_cr_mappings: HashMap<(String, String, String), APICRToDatabaseMapping>,
    operations: HashMap<String, Operation>,
    sync_operations: HashMap<String, SyncOperation>,
    repository_credentials: HashMap<String, RepositoryCredential>,
}

#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        InMemoryDatabase::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.lock().expect("in-memory database poisoned");
        f(&mut tables)
    }
}

impl DatabaseQueries for InMemoryDatabase {
    fn create_cluster_user(&self, user: &ClusterUser) -> DbResult<()> {
        self.with(|t| {
            t.cluster_users
                .insert(user.clusteruser_id.clone(), user.clone());
        });
        Ok(())
    }
    fn get_cluster_user_by_id(&self, id: &str) -> DbResult<Option<ClusterUser>> {
        Ok(self.with(|t| t.cluster_users.get(id).cloned()))
    }
    fn get_cluster_user_by_user_name(&self, user_name: &str) -> DbResult<Option<ClusterUser>> {
        Ok(self.with(|t| {
            t.cluster_users
                .values()
                .find(|u| u.user_name == user_name)
                .cloned()
        }))
    }
    fn delete_cluster_user_by_id(&self, id: &str) -> DbResult<usize> {
        Ok(self.with(|t| usize::from(t.cluster_users.remove(id).is_some())))
    }

    fn create_cluster_credentials(&self, creds: &ClusterCredentials) -> DbResult<()> {
        self.with(|t| {
            t.cluster_credentials
                .insert(creds.clustercredentials_cred_id.clone(), creds.clone());
        });
        Ok(())
    }
    fn get_cluster_credentials_by_id(&self, id: &str) -> DbResult<Option<ClusterCredentials>> {
        Ok(self.with(|t| t.cluster_credentials.get(id).cloned()))
    }
    fn update_cluster_credentials(&self, creds: &ClusterCredentials) -> DbResult<usize> {
        Ok(self.with(|t| {
            match t
                .cluster_credentials
                .get_mut(&creds.clustercredentials_cred_id)
            {
                Some(existing) => {
                    *existing = creds.clone();
                    1
                }
                None => 0,
            }
        }))
    }
    fn delete_cluster_credentials_by_id(&self, id: &str) -> DbResult<usize> {
        Ok(self.with(|t| usize::from(t.cluster_credentials.remove(id).is_some())))
    }

    fn create_managed_environment(&self, env: &ManagedEnvironment) -> DbResult<()> {
        self.with(|t| {
            t.managed_environments
                .insert(env.managedenvironment_id.clone(), env.clone());
        });
        Ok(())
    }
    fn get_managed_environment_by_id(
        &self,
        id: &str,
        namespace_uid: &str,
    ) -> DbResult<Option<ManagedEnvironment>> {
        Ok(self.with(|t| {
            let reachable = t.api_cr_mappings.values().any(|m| {
                m.db_relation_type == DB_RELATION_TYPE_MANAGED_ENVIRONMENT
                    && m.db_relation_key == id
                    && m.namespace_uid == namespace_uid
            });
            if reachable {
                t.managed_environments.get(id).cloned()
            } else {
                None
            }
        }))
    }
    fn get_managed_environment_by_id_unchecked(
        &self,
        id: &str,
    ) -> DbResult<Option<ManagedEnvironment>> {
        Ok(self.with(|t| t.managed_environments.get(id).cloned()))
    }
    fn update_managed_environment(&self, env: &ManagedEnvironment) -> DbResult<usize> {
        Ok(self.with(
            |t| match t.managed_environments.get_mut(&env.managedenvironment_id) {
                Some(existing) => {
                    *existing = env.clone();
                    1
                }
                None => 0,
            },
        ))
    }
    fn delete_managed_environment_by_id(&self, id: &str) -> DbResult<usize> {
        Ok(self.with(|t| usize::from(t.managed_environments.remove(id).is_some())))
    }

    fn create_gitops_engine_cluster(&self, cluster: &GitopsEngineCluster) -> DbResult<()> {
        self.with(|t| {
            t.gitops_engine_clusters
                .insert(cluster.gitopsenginecluster_id.clone(), cluster.clone());
        });
        Ok(())
    }
    fn get_gitops_engine_cluster_by_id(&self, id: &str) -> DbResult<Option<GitopsEngineCluster>> {
        Ok(self.with(|t| t.gitops_engine_clusters.get(id).cloned()))
    }
    fn list_all_gitops_engine_clusters_unchecked(&self) -> DbResult<Vec<GitopsEngineCluster>> {
        Ok(self.with(|t| t.gitops_engine_clusters.values().cloned().collect()))
    }
    fn create_gitops_engine_instance(&self, instance: &GitopsEngineInstance) -> DbResult<()> {
        self.with(|t| {
            t.gitops_engine_instances
                .insert(instance.gitopsengineinstance_id.clone(), instance.clone());
        });
        Ok(())
    }
    fn get_gitops_engine_instance_by_id(
        &self,
        id: &str,
    ) -> DbResult<Option<GitopsEngineInstance>> {
        Ok(self.with(|t| t.gitops_engine_instances.get(id).cloned()))
    }
    fn list_gitops_engine_instances_by_namespace_uid(
        &self,
        namespace_uid: &str,
    ) -> DbResult<Vec<GitopsEngineInstance>> {
        Ok(self.with(|t| {
            t.gitops_engine_instances
                .values()
                .filter(|i| i.namespace_uid == namespace_uid)
                .cloned()
                .collect()
        }))
    }

    fn create_application(&self, app: &Application) -> DbResult<()> {
        self.with(|t| {
            t.applications
                .insert(app.application_id.clone(), app.clone());
        });
        Ok(())
    }
    fn get_application_by_id(
        &self,
        id: &str,
        namespace_uid: &str,
    ) -> DbResult<Option<Application>> {
        Ok(self.with(|t| {
            let reachable = t
                .deployment_mappings
                .values()
                .any(|m| m.application_id == id && m.namespace_uid == namespace_uid);
            if reachable {
                t.applications.get(id).cloned()
            } else {
                None
            }
        }))
    }
    fn get_application_by_id_unchecked(&self, id: &str) -> DbResult<Option<Application>> {
        Ok(self.with(|t| t.applications.get(id).cloned()))
    }
    fn update_application(&self, app: &Application) -> DbResult<usize> {
        Ok(
            self.with(|t| match t.applications.get_mut(&app.application_id) {
                Some(existing) => {
                    *existing = app.clone();
                    1
                }
                None => 0,
            }),
        )
    }
    fn delete_application_by_id(&self, id: &str) -> DbResult<usize> {
        Ok(self.with(|t| usize::from(t.applications.remove(id).is_some())))
    }
    fn list_all_applications_unchecked(&self) -> DbResult<Vec<Application>> {
        Ok(self.with(|t| t.applications.values().cloned().collect()))
    }

    fn create_application_state(&self, state: &ApplicationState) -> DbResult<()> {
        self.with(|t| {
            t.application_states.insert(
                state.applicationstate_application_id.clone(),
                state.clone(),
            );
        });
        Ok(())
    }
    fn get_application_state_by_id(
        &self,
        application_id: &str,
    ) -> DbResult<Option<ApplicationState>> {
        Ok(self.with(|t| t.application_states.get(application_id).cloned()))
    }
    fn update_application_state(&self, state: &ApplicationState) -> DbResult<usize> {
        Ok(self.with(|t| {
            match t
                .application_states
                .get_mut(&state.applicationstate_application_id)
            {
                Some(existing) => {
                    *existing = state.clone();
                    1
                }
                None => 0,
            }
        }))
    }
    fn delete_application_state_by_id(&self, application_id: &str) -> DbResult<usize> {
        Ok(self.with(|t| usize::from(t.application_states.remove(application_id).is_some())))
    }

    fn create_deployment_to_application_mapping(
        &self,
        mapping: &DeploymentToApplicationMapping,
    ) -> DbResult<()> {
        self.with(|t| {
            t.deployment_mappings.insert(
                mapping.deploymenttoapplicationmapping_uid_id.clone(),
                mapping.clone(),
            );
        });
        Ok(())
    }
    fn get_deployment_to_application_mapping_by_id(
        &self,
        deployment_uid: &str,
    ) -> DbResult<Option<DeploymentToApplicationMapping>> {
        Ok(self.with(|t| t.deployment_mappings.get(deployment_uid).cloned()))
    }
    fn list_deployment_to_application_mappings_by_namespace_and_name(
        &self,
        deployment_name: &str,
        deployment_namespace: &str,
        namespace_uid: &str,
    ) -> DbResult<Vec<DeploymentToApplicationMapping>> {
        Ok(self.with(|t| {
            t.deployment_mappings
                .values()
                .filter(|m| {
                    m.deployment_name == deployment_name
                        && m.deployment_namespace == deployment_namespace
                        && m.namespace_uid == namespace_uid
                })
                .cloned()
                .collect()
        }))
    }
    fn delete_deployment_to_application_mapping_by_id(
        &self,
        deployment_uid: &str,
    ) -> DbResult<usize> {
        Ok(self.with(|t| usize::from(t.deployment_mappings.remove(deployment_uid).is_some())))
    }

    fn create_api_cr_to_database_mapping(&self, mapping: &APICRToDatabaseMapping) -> DbResult<()> {
        self.with(|t| {
            t.api_cr_mappings.insert(
                (
                    mapping.api_resource_type.clone(),
                    mapping.api_resource_uid.clone(),
                    mapping.db_relation_type.clone(),
                ),
                mapping.clone(),
            );
        });
        Ok(())
    }
    fn get_api_cr_to_database_mapping(
        &self,
        api_resource_type: &str,
        api_resource_uid: &str,
        db_relation_type: &str,
    ) -> DbResult<Option<APICRToDatabaseMapping>> {
        Ok(self.with(|t| {
            t.api_cr_mappings
                .get(&(
                    api_resource_type.to_string(),
                    api_resource_uid.to_string(),
                    db_relation_type.to_string(),
                ))
                .cloned()
        }))
    }
    fn list_api_cr_to_database_mappings_for_api_resource(
        &self,
        api_resource_type: &str,
        api_resource_name: &str,
        api_resource_namespace: &str,
        namespace_uid: &str,
    ) -> DbResult<Vec<APICRToDatabaseMapping>> {
        Ok(self.with(|t| {
            t.api_cr_mappings
                .values()
                .filter(|m| {
                    m.api_resource_type == api_resource_type
                        && m.api_resource_name == api_resource_name
                        && m.api_resource_namespace == api_resource_namespace
                        && m.namespace_uid == namespace_uid
                })
                .cloned()
                .collect()
        }))
    }
    fn get_api_cr_to_database_mapping_for_database_id(
        &self,
        db_relation_type: &str,
        db_relation_key: &str,
    ) -> DbResult<Option<APICRToDatabaseMapping>> {
        Ok(self.with(|t| {
            t.api_cr_mappings
                .values()
                .find(|m| {
                    m.db_relation_type == db_relation_type && m.db_relation_key == db_relation_key
                })
                .cloned()
        }))
    }
    fn delete_api_cr_to_database_mapping(
        &self,
        mapping: &APICRToDatabaseMapping,
    ) -> DbResult<usize> {
        Ok(self.with(|t| {
            usize::from(
                t.api_cr_mappings
                    .remove(&(
                        mapping.api_resource_type.clone(),
                        mapping.api_resource_uid.clone(),
                        mapping.db_relation_type.clone(),
                    ))
                    .is_some(),
            )
        }))
    }

    fn create_operation(&self, operation: &Operation) -> DbResult<()> {
        self.with(|t| {
            t.operations
                .insert(operation.operation_id.clone(), operation.clone());
        });
        Ok(())
    }
    fn get_operation_by_id(&self, id: &str) -> DbResult<Option<Operation>> {
        Ok(self.with(|t| t.operations.get(id).cloned()))
    }
    fn list_operations_by_resource_id_and_type(
        &self,
        resource_id: &str,
        resource_type: &str,
    ) -> DbResult<Vec<Operation>> {
        Ok(self.with(|t| {
            let mut ops: Vec<Operation> = t
                .operations
                .values()
                .filter(|o| o.resource_id == resource_id && o.resource_type == resource_type)
                .cloned()
                .collect();
            ops.sort_by_key(|o| o.created_on);
            ops
        }))
    }
    fn update_operation(&self, operation: &Operation) -> DbResult<usize> {
        Ok(
            self.with(|t| match t.operations.get_mut(&operation.operation_id) {
                Some(existing) => {
                    *existing = operation.clone();
                    1
                }
                None => 0,
            }),
        )
    }
    fn delete_operation_by_id(&self, id: &str) -> DbResult<usize> {
        Ok(self.with(|t| usize::from(t.operations.remove(id).is_some())))
    }

    fn create_sync_operation(&self, sync_operation: &SyncOperation) -> DbResult<()> {
        self.with(|t| {
            t.sync_operations.insert(
                sync_operation.syncoperation_id.clone(),
                sync_operation.clone(),
            );
        });
        Ok(())
    }
    fn get_sync_operation_by_id(&self, id: &str) -> DbResult<Option<SyncOperation>> {
        Ok(self.with(|t| t.sync_operations.get(id).cloned()))
    }
    fn list_sync_operations_by_application_id(
        &self,
        application_id: &str,
    ) -> DbResult<Vec<SyncOperation>> {
        Ok(self.with(|t| {
            t.sync_operations
                .values()
                .filter(|s| s.application_id == application_id)
                .cloned()
                .collect()
        }))
    }
    fn update_sync_operation(&self, sync_operation: &SyncOperation) -> DbResult<usize> {
        Ok(self.with(|t| {
            match t.sync_operations.get_mut(&sync_operation.syncoperation_id) {
                Some(existing) => {
                    *existing = sync_operation.clone();
                    1
                }
                None => 0,
            }
        }))
    }
    fn delete_sync_operation_by_id(&self, id: &str) -> DbResult<usize> {
        Ok(self.with(|t| usize::from(t.sync_operations.remove(id).is_some())))
    }

    fn create_repository_credential(&self, credential: &RepositoryCredential) -> DbResult<()> {
        self.with(|t| {
            t.repository_credentials.insert(
                credential.repositorycredentials_id.clone(),
                credential.clone(),
            );
        });
        Ok(())
    }
    fn get_repository_credential_by_id(
        &self,
        id: &str,
    ) -> DbResult<Option<RepositoryCredential>> {
        Ok(self.with(|t| t.repository_credentials.get(id).cloned()))
    }
    fn update_repository_credential(&self, credential: &RepositoryCredential) -> DbResult<usize> {
        Ok(self.with(|t| {
            match t
                .repository_credentials
                .get_mut(&credential.repositorycredentials_id)
            {
                Some(existing) => {
                    *existing = credential.clone();
                    1
                }
                None => 0,
            }
        }))
    }
    fn delete_repository_credential_by_id(&self, id: &str) -> DbResult<usize> {
        Ok(self.with(|t| usize::from(t.repository_credentials.remove(id).is_some())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_none_for_missing_rows() {
        let db = InMemoryDatabase::new();
        assert!(db.get_application_by_id_unchecked("nope").unwrap().is_none());
        assert!(db.get_cluster_user_by_id("nope").unwrap().is_none());
    }

    #[test]
    fn test_delete_missing_row_is_zero_not_error() {
        let db = InMemoryDatabase::new();
        assert_eq!(db.delete_application_by_id("nope").unwrap(), 0);
        assert_eq!(db.delete_operation_by_id("nope").unwrap(), 0);
    }

    #[test]
    fn test_checked_get_requires_mapping() {
        let db = InMemoryDatabase::new();

        let env = ManagedEnvironment::new("my-managed-env".into(), "creds-1".into());
        db.create_managed_environment(&env).unwrap();

        // Unreachable without a mapping in the namespace.
        assert!(db
            .get_managed_environment_by_id(&env.managedenvironment_id, "ns-uid-1")
            .unwrap()
            .is_none());

        db.create_api_cr_to_database_mapping(&APICRToDatabaseMapping {
            api_resource_type: "GitOpsDeploymentManagedEnvironment".into(),
            api_resource_uid: "cr-uid-1".into(),
            api_resource_name: "my-managed-env".into(),
            api_resource_namespace: "jane".into(),
            namespace_uid: "ns-uid-1".into(),
            db_relation_type: DB_RELATION_TYPE_MANAGED_ENVIRONMENT.into(),
            db_relation_key: env.managedenvironment_id.clone(),
        })
        .unwrap();

        assert!(db
            .get_managed_environment_by_id(&env.managedenvironment_id, "ns-uid-1")
            .unwrap()
            .is_some());
        assert!(db
            .get_managed_environment_by_id(&env.managedenvironment_id, "other-ns")
            .unwrap()
            .is_none());
    }
}
