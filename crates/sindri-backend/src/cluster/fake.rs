/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! In-memory [`WorkspaceClient`] used by tests and local development.
//!
//! Objects carry resource versions; replace-style updates require the caller
//! to present the current version and fail with [`ClusterError::Conflict`]
//! otherwise. [`FakeWorkspaceClient::inject_update_conflicts`] forces the
//! next N updates to conflict regardless, to exercise read-modify-write
//! retry paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;

use sindri_models::api::{
    GitOpsDeployment, GitOpsDeploymentManagedEnvironment, GitOpsDeploymentRepositoryCredential,
    GitOpsDeploymentSyncRun, OperationResource, KUBECONFIG_KEY, MANAGED_ENVIRONMENT_SECRET_TYPE,
};

use super::{ClusterError, ClusterResult, WorkspaceClient};

type Key = (String, String);

#[derive(Default)]
struct FakeState {
    namespaces: HashMap<String, Namespace>,
    secrets: HashMap<Key, Secret>,
    deployments: HashMap<Key, GitOpsDeployment>,
    sync_runs: HashMap<Key, GitOpsDeploymentSyncRun>,
    managed_environments: HashMap<Key, GitOpsDeploymentManagedEnvironment>,
    repository_credentials: HashMap<Key, GitOpsDeploymentRepositoryCredential>,
    operations: HashMap<Key, OperationResource>,
}

#[derive(Default)]
pub struct FakeWorkspaceClient {
    state: Mutex<FakeState>,
    resource_version: AtomicU64,
    conflicts_to_inject: AtomicUsize,
}

fn key(meta: &ObjectMeta) -> Key {
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

impl FakeWorkspaceClient {
    pub fn new() -> Self {
        FakeWorkspaceClient::default()
    }

    fn next_resource_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Forces the next `count` replace-style updates to fail with a conflict.
    pub fn inject_update_conflicts(&self, count: usize) {
        self.conflicts_to_inject.store(count, Ordering::SeqCst);
    }

    fn take_injected_conflict(&self) -> bool {
        self.conflicts_to_inject
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn add_namespace(&self, name: &str, uid: &str) {
        let mut state = self.state.lock().unwrap();
        state.namespaces.insert(
            name.to_string(),
            Namespace {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    uid: Some(uid.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
    }

    /// Seeds or force-overwrites an object, bumping its resource version the
    /// way a concurrent writer would.
    pub fn put_gitops_deployment(&self, mut deployment: GitOpsDeployment) {
        if deployment.metadata.uid.is_none() {
            deployment.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        deployment.metadata.resource_version = Some(self.next_resource_version());
        let mut state = self.state.lock().unwrap();
        state
            .deployments
            .insert(key(&deployment.metadata), deployment);
    }

    pub fn remove_gitops_deployment(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .deployments
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn put_sync_run(&self, mut run: GitOpsDeploymentSyncRun) {
        if run.metadata.uid.is_none() {
            run.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        run.metadata.resource_version = Some(self.next_resource_version());
        let mut state = self.state.lock().unwrap();
        state.sync_runs.insert(key(&run.metadata), run);
    }

    pub fn remove_sync_run(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .sync_runs
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn put_managed_environment(&self, mut env: GitOpsDeploymentManagedEnvironment) {
        if env.metadata.uid.is_none() {
            env.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        env.metadata.resource_version = Some(self.next_resource_version());
        let mut state = self.state.lock().unwrap();
        state.managed_environments.insert(key(&env.metadata), env);
    }

    pub fn remove_managed_environment(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .managed_environments
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn put_repository_credential(&self, mut cred: GitOpsDeploymentRepositoryCredential) {
        if cred.metadata.uid.is_none() {
            cred.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        cred.metadata.resource_version = Some(self.next_resource_version());
        let mut state = self.state.lock().unwrap();
        state.repository_credentials.insert(key(&cred.metadata), cred);
    }

    pub fn remove_repository_credential(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .repository_credentials
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn put_secret(&self, secret: Secret) {
        let mut state = self.state.lock().unwrap();
        state.secrets.insert(key(&secret.metadata), secret);
    }

    /// Seeds a managed-environment secret holding a kubeconfig.
    pub fn put_managed_environment_secret(&self, namespace: &str, name: &str, kubeconfig: &str) {
        let mut data = BTreeMap::new();
        data.insert(
            KUBECONFIG_KEY.to_string(),
            ByteString(kubeconfig.as_bytes().to_vec()),
        );
        self.put_secret(Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            type_: Some(MANAGED_ENVIRONMENT_SECRET_TYPE.to_string()),
            data: Some(data),
            ..Default::default()
        });
    }

    pub fn remove_secret(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .secrets
            .remove(&(namespace.to_string(), name.to_string()));
    }

    /// Operation resources currently present, for assertions.
    pub fn operation_resources(&self) -> Vec<OperationResource> {
        let state = self.state.lock().unwrap();
        state.operations.values().cloned().collect()
    }
}

#[async_trait]
impl WorkspaceClient for FakeWorkspaceClient {
    async fn get_namespace(&self, name: &str) -> ClusterResult<Option<Namespace>> {
        let state = self.state.lock().unwrap();
        Ok(state.namespaces.get(name).cloned())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> ClusterResult<Option<Secret>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_gitops_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeployment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn update_gitops_deployment(&self, deployment: &GitOpsDeployment) -> ClusterResult<()> {
        let obj_key = key(&deployment.metadata);

        if self.take_injected_conflict() {
            return Err(ClusterError::Conflict(format!(
                "the object has been modified: {}/{}",
                obj_key.0, obj_key.1
            )));
        }

        let next_version = self.next_resource_version();
        let mut state = self.state.lock().unwrap();
        let existing = state.deployments.get_mut(&obj_key).ok_or_else(|| {
            ClusterError::Api(format!("gitopsdeployment {}/{} not found", obj_key.0, obj_key.1))
        })?;

        if existing.metadata.resource_version != deployment.metadata.resource_version {
            return Err(ClusterError::Conflict(format!(
                "the object has been modified: {}/{}",
                obj_key.0, obj_key.1
            )));
        }

        let status = existing.status.clone();
        *existing = deployment.clone();
        existing.status = status;
        existing.metadata.resource_version = Some(next_version);
        Ok(())
    }

    async fn update_gitops_deployment_status(
        &self,
        deployment: &GitOpsDeployment,
    ) -> ClusterResult<()> {
        let obj_key = key(&deployment.metadata);
        let next_version = self.next_resource_version();
        let mut state = self.state.lock().unwrap();
        let existing = state.deployments.get_mut(&obj_key).ok_or_else(|| {
            ClusterError::Api(format!("gitopsdeployment {}/{} not found", obj_key.0, obj_key.1))
        })?;

        existing.status = deployment.status.clone();
        existing.metadata.resource_version = Some(next_version);
        Ok(())
    }

    async fn get_sync_run(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeploymentSyncRun>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sync_runs
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_managed_environment(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeploymentManagedEnvironment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .managed_environments
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_managed_environments(
        &self,
        namespace: &str,
    ) -> ClusterResult<Vec<GitOpsDeploymentManagedEnvironment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .managed_environments
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, env)| env.clone())
            .collect())
    }

    async fn get_repository_credential(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeploymentRepositoryCredential>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .repository_credentials
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_operation_resource(
        &self,
        namespace: &str,
        operation: &OperationResource,
    ) -> ClusterResult<()> {
        let mut operation = operation.clone();
        operation.metadata.namespace = Some(namespace.to_string());
        let obj_key = key(&operation.metadata);
        let mut state = self.state.lock().unwrap();
        state.operations.insert(obj_key, operation);
        Ok(())
    }

    async fn delete_operation_resource(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .operations
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(namespace: &str, name: &str) -> GitOpsDeployment {
        GitOpsDeployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_update_requires_current_resource_version() {
        let client = FakeWorkspaceClient::new();
        client.put_gitops_deployment(deployment("jane", "my-gitops-depl"));

        let mut stale = client
            .get_gitops_deployment("jane", "my-gitops-depl")
            .await
            .unwrap()
            .unwrap();

        // Concurrent writer bumps the version.
        client.put_gitops_deployment(deployment("jane", "my-gitops-depl"));

        stale.spec.source.path = "environments/dev".into();
        let err = client.update_gitops_deployment(&stale).await.unwrap_err();
        assert!(err.is_conflict());

        // Re-read and retry succeeds.
        let mut fresh = client
            .get_gitops_deployment("jane", "my-gitops-depl")
            .await
            .unwrap()
            .unwrap();
        fresh.spec.source.path = "environments/dev".into();
        client.update_gitops_deployment(&fresh).await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_conflicts_are_consumed() {
        let client = FakeWorkspaceClient::new();
        client.put_gitops_deployment(deployment("jane", "my-gitops-depl"));
        client.inject_update_conflicts(1);

        let depl = client
            .get_gitops_deployment("jane", "my-gitops-depl")
            .await
            .unwrap()
            .unwrap();

        assert!(client.update_gitops_deployment(&depl).await.is_err());
        let fresh = client
            .get_gitops_deployment("jane", "my-gitops-depl")
            .await
            .unwrap()
            .unwrap();
        assert!(client.update_gitops_deployment(&fresh).await.is_ok());
    }
}
