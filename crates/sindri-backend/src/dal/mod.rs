/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Data Access Layer
//!
//! The event loops consume the [`DatabaseQueries`] trait: a typed façade over
//! the record set with create/get/list/update/delete operations per entity.
//! Conventions:
//!
//! - `get_*` returns `Ok(None)` when the row does not exist; not-found is a
//!   control-flow signal, never an error.
//! - `delete_*` returns the number of rows affected; deleting a missing row
//!   is `Ok(0)`.
//! - Checked variants take the UID of the namespace the caller is acting in
//!   and verify the row is reachable from that namespace through a mapping
//!   table. `*_unchecked` variants skip the filter and may only be used by
//!   callers that have already verified namespace ownership.
//!
//! Two implementations exist: [`DAL`] (Diesel/Postgres, production) and
//! [`in_memory::InMemoryDatabase`] (used by tests and local development).

use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;

use sindri_models::models::{
    APICRToDatabaseMapping, Application, ApplicationState, ClusterCredentials, ClusterUser,
    DeploymentToApplicationMapping, GitopsEngineCluster, GitopsEngineInstance, ManagedEnvironment,
    Operation, RepositoryCredential, SyncOperation,
};

mod application_states;
mod applications;
mod cluster_credentials;
mod cluster_users;
mod gitops_engine;
pub mod in_memory;
mod mappings;
mod managed_environments;
mod operations;
mod repository_credentials;
mod sync_operations;

pub use application_states::ApplicationStatesDAL;
pub use applications::ApplicationsDAL;
pub use cluster_credentials::ClusterCredentialsDAL;
pub use cluster_users::ClusterUsersDAL;
pub use gitops_engine::GitopsEngineDAL;
pub use mappings::MappingsDAL;
pub use managed_environments::ManagedEnvironmentsDAL;
pub use operations::OperationsDAL;
pub use repository_credentials::RepositoryCredentialsDAL;
pub use sync_operations::SyncOperationsDAL;

/// Errors surfaced by the data access layer.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),
}

pub type DbResult<T> = Result<T, DatabaseError>;

/// The typed query façade the event loops are written against.
pub trait DatabaseQueries: Send + Sync {
    // Cluster users
    fn create_cluster_user(&self, user: &ClusterUser) -> DbResult<()>;
    fn get_cluster_user_by_id(&self, id: &str) -> DbResult<Option<ClusterUser>>;
    fn get_cluster_user_by_user_name(&self, user_name: &str) -> DbResult<Option<ClusterUser>>;
    fn delete_cluster_user_by_id(&self, id: &str) -> DbResult<usize>;

    // Cluster credentials
    fn create_cluster_credentials(&self, creds: &ClusterCredentials) -> DbResult<()>;
    fn get_cluster_credentials_by_id(&self, id: &str) -> DbResult<Option<ClusterCredentials>>;
    fn update_cluster_credentials(&self, creds: &ClusterCredentials) -> DbResult<usize>;
    fn delete_cluster_credentials_by_id(&self, id: &str) -> DbResult<usize>;

    // Managed environments
    fn create_managed_environment(&self, env: &ManagedEnvironment) -> DbResult<()>;
    /// Checked: the row must be reachable from `namespace_uid` through an
    /// APICRToDatabaseMapping.
    fn get_managed_environment_by_id(
        &self,
        id: &str,
        namespace_uid: &str,
    ) -> DbResult<Option<ManagedEnvironment>>;
    fn get_managed_environment_by_id_unchecked(
        &self,
        id: &str,
    ) -> DbResult<Option<ManagedEnvironment>>;
    fn update_managed_environment(&self, env: &ManagedEnvironment) -> DbResult<usize>;
    fn delete_managed_environment_by_id(&self, id: &str) -> DbResult<usize>;

    // GitOps engine clusters and instances
    fn create_gitops_engine_cluster(&self, cluster: &GitopsEngineCluster) -> DbResult<()>;
    fn get_gitops_engine_cluster_by_id(&self, id: &str) -> DbResult<Option<GitopsEngineCluster>>;
    fn list_all_gitops_engine_clusters_unchecked(&self) -> DbResult<Vec<GitopsEngineCluster>>;
    fn create_gitops_engine_instance(&self, instance: &GitopsEngineInstance) -> DbResult<()>;
    fn get_gitops_engine_instance_by_id(&self, id: &str)
        -> DbResult<Option<GitopsEngineInstance>>;
    fn list_gitops_engine_instances_by_namespace_uid(
        &self,
        namespace_uid: &str,
    ) -> DbResult<Vec<GitopsEngineInstance>>;

    // Applications
    fn create_application(&self, app: &Application) -> DbResult<()>;
    /// Checked: the row must be reachable from `namespace_uid` through a
    /// DeploymentToApplicationMapping.
    fn get_application_by_id(&self, id: &str, namespace_uid: &str)
        -> DbResult<Option<Application>>;
    fn get_application_by_id_unchecked(&self, id: &str) -> DbResult<Option<Application>>;
    fn update_application(&self, app: &Application) -> DbResult<usize>;
    fn delete_application_by_id(&self, id: &str) -> DbResult<usize>;
    fn list_all_applications_unchecked(&self) -> DbResult<Vec<Application>>;

    // Application states
    fn create_application_state(&self, state: &ApplicationState) -> DbResult<()>;
    fn get_application_state_by_id(
        &self,
        application_id: &str,
    ) -> DbResult<Option<ApplicationState>>;
    fn update_application_state(&self, state: &ApplicationState) -> DbResult<usize>;
    fn delete_application_state_by_id(&self, application_id: &str) -> DbResult<usize>;

    // Deployment-to-application mappings
    fn create_deployment_to_application_mapping(
        &self,
        mapping: &DeploymentToApplicationMapping,
    ) -> DbResult<()>;
    fn get_deployment_to_application_mapping_by_id(
        &self,
        deployment_uid: &str,
    ) -> DbResult<Option<DeploymentToApplicationMapping>>;
    fn list_deployment_to_application_mappings_by_namespace_and_name(
        &self,
        deployment_name: &str,
        deployment_namespace: &str,
        namespace_uid: &str,
    ) -> DbResult<Vec<DeploymentToApplicationMapping>>;
    fn delete_deployment_to_application_mapping_by_id(
        &self,
        deployment_uid: &str,
    ) -> DbResult<usize>;

    // API-CR-to-database mappings
    fn create_api_cr_to_database_mapping(&self, mapping: &APICRToDatabaseMapping) -> DbResult<()>;
    fn get_api_cr_to_database_mapping(
        &self,
        api_resource_type: &str,
        api_resource_uid: &str,
        db_relation_type: &str,
    ) -> DbResult<Option<APICRToDatabaseMapping>>;
    fn list_api_cr_to_database_mappings_for_api_resource(
        &self,
        api_resource_type: &str,
        api_resource_name: &str,
        api_resource_namespace: &str,
        namespace_uid: &str,
    ) -> DbResult<Vec<APICRToDatabaseMapping>>;
    /// Reverse lookup: the mapping (if any) whose database relation points at
    /// the given row.
    fn get_api_cr_to_database_mapping_for_database_id(
        &self,
        db_relation_type: &str,
        db_relation_key: &str,
    ) -> DbResult<Option<APICRToDatabaseMapping>>;
    fn delete_api_cr_to_database_mapping(
        &self,
        mapping: &APICRToDatabaseMapping,
    ) -> DbResult<usize>;

    // Operations
    fn create_operation(&self, operation: &Operation) -> DbResult<()>;
    fn get_operation_by_id(&self, id: &str) -> DbResult<Option<Operation>>;
    fn list_operations_by_resource_id_and_type(
        &self,
        resource_id: &str,
        resource_type: &str,
    ) -> DbResult<Vec<Operation>>;
    fn update_operation(&self, operation: &Operation) -> DbResult<usize>;
    fn delete_operation_by_id(&self, id: &str) -> DbResult<usize>;

    // Sync operations
    fn create_sync_operation(&self, sync_operation: &SyncOperation) -> DbResult<()>;
    fn get_sync_operation_by_id(&self, id: &str) -> DbResult<Option<SyncOperation>>;
    fn list_sync_operations_by_application_id(
        &self,
        application_id: &str,
    ) -> DbResult<Vec<SyncOperation>>;
    fn update_sync_operation(&self, sync_operation: &SyncOperation) -> DbResult<usize>;
    fn delete_sync_operation_by_id(&self, id: &str) -> DbResult<usize>;

    // Repository credentials
    fn create_repository_credential(&self, credential: &RepositoryCredential) -> DbResult<()>;
    fn get_repository_credential_by_id(&self, id: &str)
        -> DbResult<Option<RepositoryCredential>>;
    fn update_repository_credential(&self, credential: &RepositoryCredential) -> DbResult<usize>;
    fn delete_repository_credential_by_id(&self, id: &str) -> DbResult<usize>;
}

/// Diesel-backed implementation of [`DatabaseQueries`].
#[derive(Clone)]
pub struct DAL {
    pub pool: Pool<ConnectionManager<PgConnection>>,
}

impl DAL {
    pub fn new(pool: Pool<ConnectionManager<PgConnection>>) -> Self {
        DAL { pool }
    }

    pub(crate) fn conn(
        &self,
    ) -> Result<PooledConnection<ConnectionManager<PgConnection>>, DatabaseError> {
        self.pool.get().map_err(|e| DatabaseError::Pool(e.to_string()))
    }

    pub fn cluster_users(&self) -> ClusterUsersDAL {
        ClusterUsersDAL { dal: self }
    }

    pub fn cluster_credentials(&self) -> ClusterCredentialsDAL {
        ClusterCredentialsDAL { dal: self }
    }

    pub fn managed_environments(&self) -> ManagedEnvironmentsDAL {
        ManagedEnvironmentsDAL { dal: self }
    }

    pub fn gitops_engine(&self) -> GitopsEngineDAL {
        GitopsEngineDAL { dal: self }
    }

    pub fn applications(&self) -> ApplicationsDAL {
        ApplicationsDAL { dal: self }
    }

    pub fn application_states(&self) -> ApplicationStatesDAL {
        ApplicationStatesDAL { dal: self }
    }

    pub fn mappings(&self) -> MappingsDAL {
        MappingsDAL { dal: self }
    }

    pub fn operations(&self) -> OperationsDAL {
        OperationsDAL { dal: self }
    }

    pub fn sync_operations(&self) -> SyncOperationsDAL {
        SyncOperationsDAL { dal: self }
    }

    pub fn repository_credentials(&self) -> RepositoryCredentialsDAL {
        RepositoryCredentialsDAL { dal: self }
    }
}

impl DatabaseQueries for DAL {
    fn create_cluster_user(&self, user: &ClusterUser) -> DbResult<()> {
        self.cluster_users().create(user)
    }
    fn get_cluster_user_by_id(&self, id: &str) -> DbResult<Option<ClusterUser>> {
        self.cluster_users().get(id)
    }
    fn get_cluster_user_by_user_name(&self, user_name: &str) -> DbResult<Option<ClusterUser>> {
        self.cluster_users().get_by_user_name(user_name)
    }
    fn delete_cluster_user_by_id(&self, id: &str) -> DbResult<usize> {
        self.cluster_users().delete(id)
    }

    fn create_cluster_credentials(&self, creds: &ClusterCredentials) -> DbResult<()> {
        self.cluster_credentials().create(creds)
    }
    fn get_cluster_credentials_by_id(&self, id: &str) -> DbResult<Option<ClusterCredentials>> {
        self.cluster_credentials().get(id)
    }
    fn update_cluster_credentials(&self, creds: &ClusterCredentials) -> DbResult<usize> {
        self.cluster_credentials().update(creds)
    }
    fn delete_cluster_credentials_by_id(&self, id: &str) -> DbResult<usize> {
        self.cluster_credentials().delete(id)
    }

    fn create_managed_environment(&self, env: &ManagedEnvironment) -> DbResult<()> {
        self.managed_environments().create(env)
    }
    fn get_managed_environment_by_id(
        &self,
        id: &str,
        namespace_uid: &str,
    ) -> DbResult<Option<ManagedEnvironment>> {
        self.managed_environments().get_checked(id, namespace_uid)
    }
    fn get_managed_environment_by_id_unchecked(
        &self,
        id: &str,
    ) -> DbResult<Option<ManagedEnvironment>> {
        self.managed_environments().get(id)
    }
    fn update_managed_environment(&self, env: &ManagedEnvironment) -> DbResult<usize> {
        self.managed_environments().update(env)
    }
    fn delete_managed_environment_by_id(&self, id: &str) -> DbResult<usize> {
        self.managed_environments().delete(id)
    }

    fn create_gitops_engine_cluster(&self, cluster: &GitopsEngineCluster) -> DbResult<()> {
        self.gitops_engine().create_cluster(cluster)
    }
    fn get_gitops_engine_cluster_by_id(&self, id: &str) -> DbResult<Option<GitopsEngineCluster>> {
        self.gitops_engine().get_cluster(id)
    }
    fn list_all_gitops_engine_clusters_unchecked(&self) -> DbResult<Vec<GitopsEngineCluster>> {
        self.gitops_engine().list_all_clusters()
    }
    fn create_gitops_engine_instance(&self, instance: &GitopsEngineInstance) -> DbResult<()> {
        self.gitops_engine().create_instance(instance)
    }
    fn get_gitops_engine_instance_by_id(
        &self,
        id: &str,
    ) -> DbResult<Option<GitopsEngineInstance>> {
        self.gitops_engine().get_instance(id)
    }
    fn list_gitops_engine_instances_by_namespace_uid(
        &self,
        namespace_uid: &str,
    ) -> DbResult<Vec<GitopsEngineInstance>> {
        self.gitops_engine().list_instances_by_namespace_uid(namespace_uid)
    }

    fn create_application(&self, app: &Application) -> DbResult<()> {
        self.applications().create(app)
    }
    fn get_application_by_id(
        &self,
        id: &str,
        namespace_uid: &str,
    ) -> DbResult<Option<Application>> {
        self.applications().get_checked(id, namespace_uid)
    }
    fn get_application_by_id_unchecked(&self, id: &str) -> DbResult<Option<Application>> {
        self.applications().get(id)
    }
    fn update_application(&self, app: &Application) -> DbResult<usize> {
        self.applications().update(app)
    }
    fn delete_application_by_id(&self, id: &str) -> DbResult<usize> {
        self.applications().delete(id)
    }
    fn list_all_applications_unchecked(&self) -> DbResult<Vec<Application>> {
        self.applications().list_all()
    }

    fn create_application_state(&self, state: &ApplicationState) -> DbResult<()> {
        self.application_states().create(state)
    }
    fn get_application_state_by_id(
        &self,
        application_id: &str,
    ) -> DbResult<Option<ApplicationState>> {
        self.application_states().get(application_id)
    }
    fn update_application_state(&self, state: &ApplicationState) -> DbResult<usize> {
        self.application_states().update(state)
    }
    fn delete_application_state_by_id(&self, application_id: &str) -> DbResult<usize> {
        self.application_states().delete(application_id)
    }

    fn create_deployment_to_application_mapping(
        &self,
        mapping: &DeploymentToApplicationMapping,
    ) -> DbResult<()> {
        self.mappings().create_deployment_mapping(mapping)
    }
    fn get_deployment_to_application_mapping_by_id(
        &self,
        deployment_uid: &str,
    ) -> DbResult<Option<DeploymentToApplicationMapping>> {
        self.mappings().get_deployment_mapping(deployment_uid)
    }
    fn list_deployment_to_application_mappings_by_namespace_and_name(
        &self,
        deployment_name: &str,
        deployment_namespace: &str,
        namespace_uid: &str,
    ) -> DbResult<Vec<DeploymentToApplicationMapping>> {
        self.mappings().list_deployment_mappings_by_namespace_and_name(
            deployment_name,
            deployment_namespace,
            namespace_uid,
        )
    }
    fn delete_deployment_to_application_mapping_by_id(
        &self,
        deployment_uid: &str,
    ) -> DbResult<usize> {
        self.mappings().delete_deployment_mapping(deployment_uid)
    }

    fn create_api_cr_to_database_mapping(&self, mapping: &APICRToDatabaseMapping) -> DbResult<()> {
        self.mappings().create_api_cr_mapping(mapping)
    }
    fn get_api_cr_to_database_mapping(
        &self,
        api_resource_type: &str,
        api_resource_uid: &str,
        db_relation_type: &str,
    ) -> DbResult<Option<APICRToDatabaseMapping>> {
        self.mappings()
            .get_api_cr_mapping(api_resource_type, api_resource_uid, db_relation_type)
    }
    fn list_api_cr_to_database_mappings_for_api_resource(
        &self,
        api_resource_type: &str,
        api_resource_name: &str,
        api_resource_namespace: &str,
        namespace_uid: &str,
    ) -> DbResult<Vec<APICRToDatabaseMapping>> {
        self.mappings().list_api_cr_mappings_for_api_resource(
            api_resource_type,
            api_resource_name,
            api_resource_namespace,
            namespace_uid,
        )
    }
    fn get_api_cr_to_database_mapping_for_database_id(
        &self,
        db_relation_type: &str,
        db_relation_key: &str,
    ) -> DbResult<Option<APICRToDatabaseMapping>> {
        self.mappings()
            .get_api_cr_mapping_for_database_id(db_relation_type, db_relation_key)
    }
    fn delete_api_cr_to_database_mapping(
        &self,
        mapping: &APICRToDatabaseMapping,
    ) -> DbResult<usize> {
        self.mappings().delete_api_cr_mapping(mapping)
    }

    fn create_operation(&self, operation: &Operation) -> DbResult<()> {
        self.operations().create(operation)
    }
    fn get_operation_by_id(&self, id: &str) -> DbResult<Option<Operation>> {
        self.operations().get(id)
    }
    fn list_operations_by_resource_id_and_type(
        &self,
        resource_id: &str,
        resource_type: &str,
    ) -> DbResult<Vec<Operation>> {
        self.operations().list_by_resource(resource_id, resource_type)
    }
    fn update_operation(&self, operation: &Operation) -> DbResult<usize> {
        self.operations().update(operation)
    }
    fn delete_operation_by_id(&self, id: &str) -> DbResult<usize> {
        self.operations().delete(id)
    }

    fn create_sync_operation(&self, sync_operation: &SyncOperation) -> DbResult<()> {
        self.sync_operations().create(sync_operation)
    }
    fn get_sync_operation_by_id(&self, id: &str) -> DbResult<Option<SyncOperation>> {
        self.sync_operations().get(id)
    }
    fn list_sync_operations_by_application_id(
        &self,
        application_id: &str,
    ) -> DbResult<Vec<SyncOperation>> {
        self.sync_operations().list_by_application_id(application_id)
    }
    fn update_sync_operation(&self, sync_operation: &SyncOperation) -> DbResult<usize> {
        self.sync_operations().update(sync_operation)
    }
    fn delete_sync_operation_by_id(&self, id: &str) -> DbResult<usize> {
        self.sync_operations().delete(id)
    }

    fn create_repository_credential(&self, credential: &RepositoryCredential) -> DbResult<()> {
        self.repository_credentials().create(credential)
    }
    fn get_repository_credential_by_id(
        &self,
        id: &str,
    ) -> DbResult<Option<RepositoryCredential>> {
        self.repository_credentials().get(id)
    }
    fn update_repository_credential(&self, credential: &RepositoryCredential) -> DbResult<usize> {
        self.repository_credentials().update(credential)
    }
    fn delete_repository_credential_by_id(&self, id: &str) -> DbResult<usize> {
        self.repository_credentials().delete(id)
    }
}
