/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Shared Resource Loop
//!
//! ClusterUser, GitopsEngineInstance, ManagedEnvironment and
//! RepositoryCredential rows can be referenced by many GitOpsDeployments at
//! once. This loop is the single serialization point for get-or-create and
//! reconcile operations on them: every request carries a oneshot reply
//! channel and the loop processes requests strictly in arrival order, so two
//! concurrent callers can never race a duplicate row into existence.
//!
//! No request handler blocks on another request to this loop.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use sindri_models::api::{
    GitOpsDeploymentManagedEnvironment, KUBECONFIG_KEY,
};
use sindri_models::models::mappings::{
    API_RESOURCE_TYPE_MANAGED_ENVIRONMENT, API_RESOURCE_TYPE_REPOSITORY_CREDENTIAL,
    DB_RELATION_TYPE_MANAGED_ENVIRONMENT, DB_RELATION_TYPE_REPOSITORY_CREDENTIAL,
};
use sindri_models::models::operations::OPERATION_RESOURCE_TYPE_REPOSITORY_CREDENTIAL;
use sindri_models::models::{
    APICRToDatabaseMapping, ClusterCredentials, ClusterUser, GitopsEngineCluster,
    GitopsEngineInstance, ManagedEnvironment, Operation, RepositoryCredential,
};

use crate::cluster::WorkspaceClient;
use crate::dal::DatabaseQueries;
use crate::errors::{ReconcileError, UserError};
use crate::operations;

/// Namespace the local GitOps engine instance runs in.
pub const DEFAULT_ENGINE_NAMESPACE: &str = "sindri-engine";

/// Identity of the API namespace a request acts within.
#[derive(Debug, Clone)]
pub struct ApiNamespace {
    pub name: String,
    pub uid: String,
}

/// Shared rows every deployment reconcile needs.
#[derive(Debug, Clone)]
pub struct SharedResourceContainer {
    pub cluster_user: ClusterUser,
    pub engine_instance: GitopsEngineInstance,
}

#[derive(Clone)]
pub struct SharedResourceEventLoop {
    sender: mpsc::UnboundedSender<SharedResourceLoopMessage>,
}

enum SharedResourceLoopMessage {
    GetOrCreateClusterUserByNamespaceUid {
        namespace_uid: String,
        reply: oneshot::Sender<Result<ClusterUser, ReconcileError>>,
    },
    GetGitopsEngineInstanceById {
        id: String,
        reply: oneshot::Sender<Result<Option<GitopsEngineInstance>, ReconcileError>>,
    },
    GetOrCreateSharedResources {
        client: Arc<dyn WorkspaceClient>,
        namespace: ApiNamespace,
        reply: oneshot::Sender<Result<SharedResourceContainer, ReconcileError>>,
    },
    ReconcileSharedManagedEnv {
        client: Arc<dyn WorkspaceClient>,
        namespace: ApiNamespace,
        name: String,
        is_workspace_target: bool,
        reply: oneshot::Sender<Result<Option<ManagedEnvironment>, ReconcileError>>,
    },
    ReconcileRepositoryCredential {
        client: Arc<dyn WorkspaceClient>,
        namespace: ApiNamespace,
        name: String,
        reply: oneshot::Sender<Result<Option<RepositoryCredential>, ReconcileError>>,
    },
}

impl SharedResourceEventLoop {
    pub fn new(db: Arc<dyn DatabaseQueries>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(internal_shared_resource_event_loop(receiver, db));
        SharedResourceEventLoop { sender }
    }

    pub async fn get_or_create_cluster_user_by_namespace_uid(
        &self,
        namespace_uid: &str,
    ) -> Result<ClusterUser, ReconcileError> {
        let (reply, rx) = oneshot::channel();
        self.send(SharedResourceLoopMessage::GetOrCreateClusterUserByNamespaceUid {
            namespace_uid: namespace_uid.to_string(),
            reply,
        })?;
        await_reply(rx).await
    }

    pub async fn get_gitops_engine_instance_by_id(
        &self,
        id: &str,
    ) -> Result<Option<GitopsEngineInstance>, ReconcileError> {
        let (reply, rx) = oneshot::channel();
        self.send(SharedResourceLoopMessage::GetGitopsEngineInstanceById {
            id: id.to_string(),
            reply,
        })?;
        await_reply(rx).await
    }

    /// Get-or-creates the ClusterUser for the namespace and the local engine
    /// instance, the pair every deployment reconcile depends on.
    pub async fn get_or_create_shared_resources(
        &self,
        client: Arc<dyn WorkspaceClient>,
        namespace: ApiNamespace,
    ) -> Result<SharedResourceContainer, ReconcileError> {
        let (reply, rx) = oneshot::channel();
        self.send(SharedResourceLoopMessage::GetOrCreateSharedResources {
            client,
            namespace,
            reply,
        })?;
        await_reply(rx).await
    }

    /// Brings the ManagedEnvironment row set in line with the resource named
    /// `name` in the namespace. Returns the row, or `None` when the resource
    /// is absent (the rows are torn down) or the target is the workspace
    /// itself. Invalid credentials surface as user errors.
    pub async fn reconcile_shared_managed_env(
        &self,
        client: Arc<dyn WorkspaceClient>,
        namespace: ApiNamespace,
        name: &str,
        is_workspace_target: bool,
    ) -> Result<Option<ManagedEnvironment>, ReconcileError> {
        let (reply, rx) = oneshot::channel();
        self.send(SharedResourceLoopMessage::ReconcileSharedManagedEnv {
            client,
            namespace,
            name: name.to_string(),
            is_workspace_target,
            reply,
        })?;
        await_reply(rx).await
    }

    /// Brings the RepositoryCredential row set in line with the resource
    /// named `name` in the namespace, emitting an Operation for the agent in
    /// all three cases (created, updated, deleted).
    pub async fn reconcile_repository_credential(
        &self,
        client: Arc<dyn WorkspaceClient>,
        namespace: ApiNamespace,
        name: &str,
    ) -> Result<Option<RepositoryCredential>, ReconcileError> {
        let (reply, rx) = oneshot::channel();
        self.send(SharedResourceLoopMessage::ReconcileRepositoryCredential {
            client,
            namespace,
            name: name.to_string(),
            reply,
        })?;
        await_reply(rx).await
    }

    fn send(&self, msg: SharedResourceLoopMessage) -> Result<(), ReconcileError> {
        self.sender
            .send(msg)
            .map_err(|_| ReconcileError::Severe("shared resource loop is not running".into()))
    }
}

async fn await_reply<T>(rx: oneshot::Receiver<Result<T, ReconcileError>>) -> Result<T, ReconcileError> {
    rx.await
        .map_err(|_| ReconcileError::Severe("shared resource loop dropped a request".into()))?
}

async fn internal_shared_resource_event_loop(
    mut receiver: mpsc::UnboundedReceiver<SharedResourceLoopMessage>,
    db: Arc<dyn DatabaseQueries>,
) {
    while let Some(msg) = receiver.recv().await {
        match msg {
            SharedResourceLoopMessage::GetOrCreateClusterUserByNamespaceUid {
                namespace_uid,
                reply,
            } => {
                let result = get_or_create_cluster_user(&db, &namespace_uid);
                let _ = reply.send(result);
            }
            SharedResourceLoopMessage::GetGitopsEngineInstanceById { id, reply } => {
                let result = db
                    .get_gitops_engine_instance_by_id(&id)
                    .map_err(ReconcileError::from);
                let _ = reply.send(result);
            }
            SharedResourceLoopMessage::GetOrCreateSharedResources {
                client,
                namespace,
                reply,
            } => {
                let result = handle_get_or_create_shared_resources(&db, &client, &namespace).await;
                let _ = reply.send(result);
            }
            SharedResourceLoopMessage::ReconcileSharedManagedEnv {
                client,
                namespace,
                name,
                is_workspace_target,
                reply,
            } => {
                let result = handle_reconcile_shared_managed_env(
                    &db,
                    &client,
                    &namespace,
                    &name,
                    is_workspace_target,
                )
                .await;
                let _ = reply.send(result);
            }
            SharedResourceLoopMessage::ReconcileRepositoryCredential {
                client,
                namespace,
                name,
                reply,
            } => {
                let result =
                    handle_reconcile_repository_credential(&db, &client, &namespace, &name).await;
                let _ = reply.send(result);
            }
        }
    }

    warn!("shared resource loop shutting down");
}

fn get_or_create_cluster_user(
    db: &Arc<dyn DatabaseQueries>,
    namespace_uid: &str,
) -> Result<ClusterUser, ReconcileError> {
    if let Some(user) = db.get_cluster_user_by_user_name(namespace_uid)? {
        return Ok(user);
    }

    let user =
        ClusterUser::new(namespace_uid).map_err(ReconcileError::Severe)?;
    db.create_cluster_user(&user)?;
    info!(user_name = %user.user_name, "created cluster user");
    Ok(user)
}

async fn get_or_create_local_engine_instance(
    db: &Arc<dyn DatabaseQueries>,
    client: &Arc<dyn WorkspaceClient>,
) -> Result<GitopsEngineInstance, ReconcileError> {
    let engine_namespace_uid = client
        .get_namespace(DEFAULT_ENGINE_NAMESPACE)
        .await?
        .and_then(|ns| ns.metadata.uid)
        .unwrap_or_default();

    if let Some(instance) = db
        .list_gitops_engine_instances_by_namespace_uid(&engine_namespace_uid)?
        .into_iter()
        .find(|i| i.namespace_name == DEFAULT_ENGINE_NAMESPACE)
    {
        return Ok(instance);
    }

    let cluster = match db
        .list_all_gitops_engine_clusters_unchecked()?
        .into_iter()
        .next()
    {
        Some(cluster) => cluster,
        None => {
            // The engine runs on the same cluster as the backend, so the
            // credential row is the in-cluster service account placeholder.
            let credentials = ClusterCredentials::new(
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                DEFAULT_ENGINE_NAMESPACE.to_string(),
            );
            db.create_cluster_credentials(&credentials)?;

            let cluster = GitopsEngineCluster::new(credentials.clustercredentials_cred_id.clone());
            db.create_gitops_engine_cluster(&cluster)?;
            info!(
                cluster_id = %cluster.gitopsenginecluster_id,
                "created local gitops engine cluster"
            );
            cluster
        }
    };

    let instance = GitopsEngineInstance::new(
        DEFAULT_ENGINE_NAMESPACE.to_string(),
        engine_namespace_uid,
        cluster.gitopsenginecluster_id.clone(),
    );
    db.create_gitops_engine_instance(&instance)?;
    info!(
        instance_id = %instance.gitopsengineinstance_id,
        namespace = %instance.namespace_name,
        "created local gitops engine instance"
    );

    Ok(instance)
}

async fn handle_get_or_create_shared_resources(
    db: &Arc<dyn DatabaseQueries>,
    client: &Arc<dyn WorkspaceClient>,
    namespace: &ApiNamespace,
) -> Result<SharedResourceContainer, ReconcileError> {
    let cluster_user = get_or_create_cluster_user(db, &namespace.uid)?;
    let engine_instance = get_or_create_local_engine_instance(db, client).await?;

    Ok(SharedResourceContainer {
        cluster_user,
        engine_instance,
    })
}

async fn handle_reconcile_shared_managed_env(
    db: &Arc<dyn DatabaseQueries>,
    client: &Arc<dyn WorkspaceClient>,
    namespace: &ApiNamespace,
    name: &str,
    is_workspace_target: bool,
) -> Result<Option<ManagedEnvironment>, ReconcileError> {
    if is_workspace_target || name.is_empty() {
        // Deployments targeting their own namespace carry no managed
        // environment row.
        return Ok(None);
    }

    let Some(env_resource) = client.get_managed_environment(&namespace.name, name).await? else {
        delete_managed_environment_rows(db, namespace, name)?;
        return Ok(None);
    };

    let credentials = cluster_credentials_from_environment(client, namespace, &env_resource).await?;

    let resource_uid = env_resource.metadata.uid.clone().unwrap_or_default();
    if resource_uid.is_empty() {
        return Err(ReconcileError::Severe(format!(
            "managed environment {}/{} has no uid",
            namespace.name, name
        )));
    }

    let existing_mapping = db.get_api_cr_to_database_mapping(
        API_RESOURCE_TYPE_MANAGED_ENVIRONMENT,
        &resource_uid,
        DB_RELATION_TYPE_MANAGED_ENVIRONMENT,
    )?;

    if let Some(mapping) = existing_mapping {
        match db.get_managed_environment_by_id_unchecked(&mapping.db_relation_key)? {
            Some(env) => {
                let stored = db.get_cluster_credentials_by_id(&env.clustercredentials_id)?;
                return match stored {
                    Some(stored) if stored.credentials_equal(&credentials) => Ok(Some(env)),
                    Some(stored) => {
                        // Same credential identity; update the row in place.
                        let updated = ClusterCredentials {
                            clustercredentials_cred_id: stored.clustercredentials_cred_id.clone(),
                            ..credentials
                        };
                        db.update_cluster_credentials(&updated)?;
                        info!(
                            managed_environment_id = %env.managedenvironment_id,
                            "updated managed environment credentials"
                        );
                        Ok(Some(env))
                    }
                    None => {
                        // Credential row vanished; recreate it and repoint the
                        // environment row.
                        db.create_cluster_credentials(&credentials)?;
                        let repaired = ManagedEnvironment {
                            clustercredentials_id: credentials.clustercredentials_cred_id.clone(),
                            ..env
                        };
                        db.update_managed_environment(&repaired)?;
                        Ok(Some(repaired))
                    }
                };
            }
            None => {
                // The mapping points at a row that no longer exists. Drop it
                // and recreate the full set below.
                db.delete_api_cr_to_database_mapping(&mapping)?;
            }
        }
    }

    // Create credentials, then the environment, then the mapping, in that
    // order: a partial failure leaves only rows that the next reconcile (or
    // the orphan reconciler) can recover.
    db.create_cluster_credentials(&credentials)?;

    let env = ManagedEnvironment::new(
        name.to_string(),
        credentials.clustercredentials_cred_id.clone(),
    );
    db.create_managed_environment(&env)?;

    db.create_api_cr_to_database_mapping(&APICRToDatabaseMapping {
        api_resource_type: API_RESOURCE_TYPE_MANAGED_ENVIRONMENT.to_string(),
        api_resource_uid: resource_uid,
        api_resource_name: name.to_string(),
        api_resource_namespace: namespace.name.clone(),
        namespace_uid: namespace.uid.clone(),
        db_relation_type: DB_RELATION_TYPE_MANAGED_ENVIRONMENT.to_string(),
        db_relation_key: env.managedenvironment_id.clone(),
    })?;

    info!(
        managed_environment_id = %env.managedenvironment_id,
        name = %name,
        "created managed environment"
    );

    Ok(Some(env))
}

fn delete_managed_environment_rows(
    db: &Arc<dyn DatabaseQueries>,
    namespace: &ApiNamespace,
    name: &str,
) -> Result<(), ReconcileError> {
    let mappings = db.list_api_cr_to_database_mappings_for_api_resource(
        API_RESOURCE_TYPE_MANAGED_ENVIRONMENT,
        name,
        &namespace.name,
        &namespace.uid,
    )?;

    for mapping in mappings
        .iter()
        .filter(|m| m.db_relation_type == DB_RELATION_TYPE_MANAGED_ENVIRONMENT)
    {
        if let Some(env) = db.get_managed_environment_by_id_unchecked(&mapping.db_relation_key)? {
            db.delete_managed_environment_by_id(&env.managedenvironment_id)?;
            db.delete_cluster_credentials_by_id(&env.clustercredentials_id)?;
            info!(
                managed_environment_id = %env.managedenvironment_id,
                "deleted managed environment rows for removed resource"
            );
        }
        db.delete_api_cr_to_database_mapping(mapping)?;
    }

    Ok(())
}

/// Builds the credential row for a managed environment from its referenced
/// secret. Missing secrets and unparsable kubeconfigs are user errors.
async fn cluster_credentials_from_environment(
    client: &Arc<dyn WorkspaceClient>,
    namespace: &ApiNamespace,
    env_resource: &GitOpsDeploymentManagedEnvironment,
) -> Result<ClusterCredentials, ReconcileError> {
    let secret_name = &env_resource.spec.cluster_credentials_secret;
    if secret_name.is_empty() {
        return Err(UserError::InvalidManagedEnvironmentCredentials(
            "no cluster credentials secret is referenced".to_string(),
        )
        .into());
    }

    let Some(secret) = client.get_secret(&namespace.name, secret_name).await? else {
        return Err(UserError::InvalidManagedEnvironmentCredentials(format!(
            "secret '{}' does not exist",
            secret_name
        ))
        .into());
    };

    let kubeconfig_bytes = secret
        .data
        .as_ref()
        .and_then(|d| d.get(KUBECONFIG_KEY))
        .map(|b| b.0.clone())
        .ok_or_else(|| {
            UserError::InvalidManagedEnvironmentCredentials(format!(
                "secret '{}' has no '{}' key",
                secret_name, KUBECONFIG_KEY
            ))
        })?;

    let kubeconfig_text = String::from_utf8(kubeconfig_bytes).map_err(|_| {
        UserError::InvalidManagedEnvironmentCredentials(format!(
            "secret '{}' kubeconfig is not valid utf-8",
            secret_name
        ))
    })?;

    let kubeconfig: kube::config::Kubeconfig =
        serde_yaml::from_str(&kubeconfig_text).map_err(|e| {
            UserError::InvalidManagedEnvironmentCredentials(format!(
                "unable to parse kubeconfig: {}",
                e
            ))
        })?;

    let context_name = kubeconfig.current_context.clone().unwrap_or_default();
    let cluster_name = kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == context_name)
        .and_then(|c| c.context.as_ref())
        .map(|c| c.cluster.clone())
        .unwrap_or_default();

    let host = kubeconfig
        .clusters
        .iter()
        .find(|c| c.name == cluster_name)
        .or_else(|| kubeconfig.clusters.first())
        .and_then(|c| c.cluster.as_ref())
        .and_then(|c| c.server.clone())
        .unwrap_or_default();

    if host.is_empty() {
        return Err(UserError::InvalidManagedEnvironmentCredentials(
            "kubeconfig does not name a reachable cluster".to_string(),
        )
        .into());
    }

    if !env_resource.spec.api_url.is_empty() && env_resource.spec.api_url != host {
        return Err(UserError::InvalidManagedEnvironmentCredentials(format!(
            "api url '{}' does not match the kubeconfig cluster '{}'",
            env_resource.spec.api_url, host
        ))
        .into());
    }

    Ok(ClusterCredentials::new(
        host,
        kubeconfig_text,
        context_name,
        String::new(),
        String::new(),
    ))
}

async fn handle_reconcile_repository_credential(
    db: &Arc<dyn DatabaseQueries>,
    client: &Arc<dyn WorkspaceClient>,
    namespace: &ApiNamespace,
    name: &str,
) -> Result<Option<RepositoryCredential>, ReconcileError> {
    let Some(cred_resource) = client.get_repository_credential(&namespace.name, name).await?
    else {
        // Resource is gone: tear down the rows and tell the agent.
        let mappings = db.list_api_cr_to_database_mappings_for_api_resource(
            API_RESOURCE_TYPE_REPOSITORY_CREDENTIAL,
            name,
            &namespace.name,
            &namespace.uid,
        )?;

        for mapping in mappings
            .iter()
            .filter(|m| m.db_relation_type == DB_RELATION_TYPE_REPOSITORY_CREDENTIAL)
        {
            if let Some(row) = db.get_repository_credential_by_id(&mapping.db_relation_key)? {
                db.delete_repository_credential_by_id(&row.repositorycredentials_id)?;
                create_repository_credential_operation(db, client, namespace, &row).await?;
            }
            db.delete_api_cr_to_database_mapping(mapping)?;
        }
        return Ok(None);
    };

    let secret_name = &cred_resource.spec.secret;
    let Some(secret) = client.get_secret(&namespace.name, secret_name).await? else {
        return Err(UserError::RepositoryCredentialSecretMissing(secret_name.clone()).into());
    };

    let get_field = |key: &str| -> Option<String> {
        secret
            .data
            .as_ref()
            .and_then(|d| d.get(key))
            .and_then(|b| String::from_utf8(b.0.clone()).ok())
    };
    let auth_username = get_field("username");
    let auth_password = get_field("password");
    let auth_ssh_key = get_field("sshPrivateKey");

    let user = get_or_create_cluster_user(db, &namespace.uid)?;
    let engine_instance = get_or_create_local_engine_instance(db, client).await?;

    let resource_uid = cred_resource.metadata.uid.clone().unwrap_or_default();
    if resource_uid.is_empty() {
        return Err(ReconcileError::Severe(format!(
            "repository credential {}/{} has no uid",
            namespace.name, name
        )));
    }

    let candidate = RepositoryCredential::new(
        user.clusteruser_id.clone(),
        cred_resource.spec.repository.clone(),
        auth_username,
        auth_password,
        auth_ssh_key,
        secret_name.clone(),
        engine_instance.enginecluster_id.clone(),
    );

    if let Some(mapping) = db.get_api_cr_to_database_mapping(
        API_RESOURCE_TYPE_REPOSITORY_CREDENTIAL,
        &resource_uid,
        DB_RELATION_TYPE_REPOSITORY_CREDENTIAL,
    )? {
        match db.get_repository_credential_by_id(&mapping.db_relation_key)? {
            Some(existing) => {
                if existing.credentials_equal(&candidate) {
                    return Ok(Some(existing));
                }
                let updated = RepositoryCredential {
                    repositorycredentials_id: existing.repositorycredentials_id.clone(),
                    ..candidate
                };
                db.update_repository_credential(&updated)?;
                create_repository_credential_operation(db, client, namespace, &updated).await?;
                info!(
                    repository_credential_id = %updated.repositorycredentials_id,
                    "updated repository credential"
                );
                return Ok(Some(updated));
            }
            None => {
                error!(
                    db_relation_key = %mapping.db_relation_key,
                    "repository credential mapping points at a missing row; recreating"
                );
                db.delete_api_cr_to_database_mapping(&mapping)?;
            }
        }
    }

    db.create_repository_credential(&candidate)?;
    db.create_api_cr_to_database_mapping(&APICRToDatabaseMapping {
        api_resource_type: API_RESOURCE_TYPE_REPOSITORY_CREDENTIAL.to_string(),
        api_resource_uid: resource_uid,
        api_resource_name: name.to_string(),
        api_resource_namespace: namespace.name.clone(),
        namespace_uid: namespace.uid.clone(),
        db_relation_type: DB_RELATION_TYPE_REPOSITORY_CREDENTIAL.to_string(),
        db_relation_key: candidate.repositorycredentials_id.clone(),
    })?;
    create_repository_credential_operation(db, client, namespace, &candidate).await?;
    info!(
        repository_credential_id = %candidate.repositorycredentials_id,
        "created repository credential"
    );

    Ok(Some(candidate))
}

async fn create_repository_credential_operation(
    db: &Arc<dyn DatabaseQueries>,
    client: &Arc<dyn WorkspaceClient>,
    namespace: &ApiNamespace,
    credential: &RepositoryCredential,
) -> Result<(), ReconcileError> {
    let user = get_or_create_cluster_user(db, &namespace.uid)?;
    let engine_instance = get_or_create_local_engine_instance(db, client).await?;

    let operation = Operation::new(
        engine_instance.gitopsengineinstance_id.clone(),
        credential.repositorycredentials_id.clone(),
        OPERATION_RESOURCE_TYPE_REPOSITORY_CREDENTIAL,
        user.clusteruser_id.clone(),
    )
    .map_err(ReconcileError::Severe)?;

    operations::create_operation(db, client, operation).await?;
    Ok(())
}
