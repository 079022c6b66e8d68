/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Kubernetes-backed implementation of [`WorkspaceClient`].
//!
//! Custom resources are driven through `Api<DynamicObject>` with the group/
//! version/kind constants from the models crate, so the backend does not need
//! generated clients for its own API types.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{ApiResource, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams, PostParams};
use kube::Api;
use kube::Client as K8sClient;
use serde::de::DeserializeOwned;
use serde::Serialize;

use sindri_models::api::{
    GitOpsDeployment, GitOpsDeploymentManagedEnvironment, GitOpsDeploymentRepositoryCredential,
    GitOpsDeploymentSyncRun, OperationResource, GROUP, KIND_GITOPS_DEPLOYMENT,
    KIND_MANAGED_ENVIRONMENT, KIND_OPERATION, KIND_REPOSITORY_CREDENTIAL, KIND_SYNC_RUN, VERSION,
};

use super::{ClusterError, ClusterResult, WorkspaceClient};

#[derive(Clone)]
pub struct KubeWorkspaceClient {
    client: K8sClient,
}

impl KubeWorkspaceClient {
    pub fn new(client: K8sClient) -> Self {
        KubeWorkspaceClient { client }
    }

    fn dynamic_api(&self, kind: &str, namespace: &str) -> Api<DynamicObject> {
        let ar = ApiResource::from_gvk(&GroupVersionKind::gvk(GROUP, VERSION, kind));
        Api::namespaced_with(self.client.clone(), namespace, &ar)
    }

    async fn get_typed<T: DeserializeOwned>(
        &self,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<T>> {
        let api = self.dynamic_api(kind, namespace);
        match api.get_opt(name).await.map_err(map_kube_error)? {
            Some(obj) => Ok(Some(from_dynamic(&obj)?)),
            None => Ok(None),
        }
    }
}

fn map_kube_error(err: kube::Error) -> ClusterError {
    if let kube::Error::Api(ref ae) = err {
        if ae.code == 409 {
            return ClusterError::Conflict(ae.message.clone());
        }
    }
    ClusterError::Api(err.to_string())
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

fn from_dynamic<T: DeserializeOwned>(obj: &DynamicObject) -> ClusterResult<T> {
    let value = serde_json::to_value(obj)
        .map_err(|e| ClusterError::Api(format!("failed to serialize object: {}", e)))?;
    serde_json::from_value(value)
        .map_err(|e| ClusterError::Api(format!("failed to deserialize object: {}", e)))
}

fn to_dynamic<S: Serialize>(
    kind: &str,
    metadata: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
    body: &S,
) -> ClusterResult<DynamicObject> {
    let ar = ApiResource::from_gvk(&GroupVersionKind::gvk(GROUP, VERSION, kind));
    let name = metadata.name.clone().unwrap_or_default();
    let mut obj = DynamicObject::new(&name, &ar);
    obj.metadata = metadata.clone();
    obj.data = serde_json::to_value(body)
        .map_err(|e| ClusterError::Api(format!("failed to serialize object body: {}", e)))?;
    Ok(obj)
}

#[async_trait]
impl WorkspaceClient for KubeWorkspaceClient {
    async fn get_namespace(&self, name: &str) -> ClusterResult<Option<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.get_opt(name).await.map_err(map_kube_error)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> ClusterResult<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await.map_err(map_kube_error)
    }

    async fn get_gitops_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeployment>> {
        self.get_typed(KIND_GITOPS_DEPLOYMENT, namespace, name).await
    }

    async fn update_gitops_deployment(&self, deployment: &GitOpsDeployment) -> ClusterResult<()> {
        let namespace = deployment.metadata.namespace.clone().unwrap_or_default();
        let name = deployment.metadata.name.clone().unwrap_or_default();
        let api = self.dynamic_api(KIND_GITOPS_DEPLOYMENT, &namespace);

        let obj = to_dynamic(
            KIND_GITOPS_DEPLOYMENT,
            &deployment.metadata,
            &serde_json::json!({ "spec": deployment.spec }),
        )?;

        api.replace(&name, &PostParams::default(), &obj)
            .await
            .map_err(map_kube_error)?;
        Ok(())
    }

    async fn update_gitops_deployment_status(
        &self,
        deployment: &GitOpsDeployment,
    ) -> ClusterResult<()> {
        let namespace = deployment.metadata.namespace.clone().unwrap_or_default();
        let name = deployment.metadata.name.clone().unwrap_or_default();
        let api = self.dynamic_api(KIND_GITOPS_DEPLOYMENT, &namespace);

        let patch = serde_json::json!({
            "apiVersion": format!("{}/{}", GROUP, VERSION),
            "kind": KIND_GITOPS_DEPLOYMENT,
            "status": deployment.status,
        });

        api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(map_kube_error)?;
        Ok(())
    }

    async fn get_sync_run(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeploymentSyncRun>> {
        self.get_typed(KIND_SYNC_RUN, namespace, name).await
    }

    async fn get_managed_environment(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeploymentManagedEnvironment>> {
        self.get_typed(KIND_MANAGED_ENVIRONMENT, namespace, name).await
    }

    async fn list_managed_environments(
        &self,
        namespace: &str,
    ) -> ClusterResult<Vec<GitOpsDeploymentManagedEnvironment>> {
        let api = self.dynamic_api(KIND_MANAGED_ENVIRONMENT, namespace);
        let list = api
            .list(&Default::default())
            .await
            .map_err(map_kube_error)?;
        list.items.iter().map(from_dynamic).collect()
    }

    async fn get_repository_credential(
        &self,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Option<GitOpsDeploymentRepositoryCredential>> {
        self.get_typed(KIND_REPOSITORY_CREDENTIAL, namespace, name).await
    }

    async fn create_operation_resource(
        &self,
        namespace: &str,
        operation: &OperationResource,
    ) -> ClusterResult<()> {
        let api = self.dynamic_api(KIND_OPERATION, namespace);
        let obj = to_dynamic(
            KIND_OPERATION,
            &operation.metadata,
            &serde_json::json!({ "spec": operation.spec }),
        )?;
        api.create(&PostParams::default(), &obj)
            .await
            .map_err(map_kube_error)?;
        Ok(())
    }

    async fn delete_operation_resource(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let api = self.dynamic_api(KIND_OPERATION, namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(map_kube_error(e)),
        }
    }
}
