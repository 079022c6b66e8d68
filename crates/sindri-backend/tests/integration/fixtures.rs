/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Shared test fixture: an in-memory database, a fake workspace client with
//! the test namespaces seeded, and a running shared resource loop.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use sindri_backend::cluster::fake::FakeWorkspaceClient;
use sindri_backend::cluster::WorkspaceClient;
use sindri_backend::dal::in_memory::InMemoryDatabase;
use sindri_backend::dal::DatabaseQueries;
use sindri_backend::eventloop::application_event_runner::ApplicationEventRunner;
use sindri_backend::eventloop::shared_resource_loop::{
    SharedResourceEventLoop, DEFAULT_ENGINE_NAMESPACE,
};
use sindri_models::api::{
    ApplicationDestination, ApplicationSource, GitOpsDeployment, GitOpsDeploymentSpec,
    GitOpsDeploymentManagedEnvironment, GitOpsDeploymentSyncRun, GitOpsDeploymentSyncRunSpec,
    ManagedEnvironmentSpec,
};

pub const WORKSPACE_NAMESPACE: &str = "jane";
pub const WORKSPACE_UID: &str = "ns-uid-jane";

pub struct TestFixture {
    pub db: Arc<dyn DatabaseQueries>,
    pub client: Arc<FakeWorkspaceClient>,
    pub shared_resource_loop: SharedResourceEventLoop,
}

impl TestFixture {
    pub fn new() -> Self {
        let db: Arc<dyn DatabaseQueries> = Arc::new(InMemoryDatabase::new());
        let client = Arc::new(FakeWorkspaceClient::new());
        client.add_namespace(WORKSPACE_NAMESPACE, WORKSPACE_UID);
        client.add_namespace(DEFAULT_ENGINE_NAMESPACE, "ns-uid-engine");

        let shared_resource_loop = SharedResourceEventLoop::new(db.clone());

        TestFixture {
            db,
            client,
            shared_resource_loop,
        }
    }

    /// Runner acting on the named resource, the way a deployment lane would.
    pub fn runner(&self, event_resource_name: &str) -> ApplicationEventRunner {
        ApplicationEventRunner {
            event_resource_name: event_resource_name.to_string(),
            event_resource_namespace: WORKSPACE_NAMESPACE.to_string(),
            workspace_client: self.client.clone(),
            shared_resource_loop: self.shared_resource_loop.clone(),
            workspace_id: WORKSPACE_UID.to_string(),
            db: self.db.clone(),
        }
    }

    /// Seeds a GitOpsDeployment into the fake cluster and returns it.
    pub async fn seed_deployment(&self, name: &str, path: &str) -> GitOpsDeployment {
        let deployment = GitOpsDeployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(WORKSPACE_NAMESPACE.to_string()),
                ..Default::default()
            },
            spec: GitOpsDeploymentSpec {
                source: ApplicationSource {
                    repo_url: "https://github.com/test/test".to_string(),
                    path: path.to_string(),
                    target_revision: String::new(),
                },
                destination: ApplicationDestination::default(),
                spec_type: String::new(),
            },
            ..Default::default()
        };
        self.client.put_gitops_deployment(deployment.clone());
        self.current_deployment(name).await
    }

    /// The fake cluster's current copy of a deployment.
    pub async fn current_deployment(&self, name: &str) -> GitOpsDeployment {
        self.client
            .get_gitops_deployment(WORKSPACE_NAMESPACE, name)
            .await
            .unwrap()
            .expect("deployment should exist in the fake cluster")
    }

    pub fn seed_sync_run(&self, name: &str, deployment_name: &str, revision: &str) {
        self.client.put_sync_run(GitOpsDeploymentSyncRun {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(WORKSPACE_NAMESPACE.to_string()),
                ..Default::default()
            },
            spec: GitOpsDeploymentSyncRunSpec {
                gitops_deployment_name: deployment_name.to_string(),
                revision_id: revision.to_string(),
            },
        });
    }

    pub fn seed_managed_environment(&self, name: &str, secret_name: &str) {
        self.client
            .put_managed_environment(GitOpsDeploymentManagedEnvironment {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(WORKSPACE_NAMESPACE.to_string()),
                    ..Default::default()
                },
                spec: ManagedEnvironmentSpec {
                    api_url: String::new(),
                    cluster_credentials_secret: secret_name.to_string(),
                },
            });
        self.client.put_managed_environment_secret(
            WORKSPACE_NAMESPACE,
            secret_name,
            &fake_kubeconfig(),
        );
    }

    /// The single deployment mapping for a deployment, if any.
    pub fn deployment_mapping(
        &self,
        name: &str,
    ) -> Option<sindri_models::models::DeploymentToApplicationMapping> {
        self.db
            .list_deployment_to_application_mappings_by_namespace_and_name(
                name,
                WORKSPACE_NAMESPACE,
                WORKSPACE_UID,
            )
            .unwrap()
            .into_iter()
            .next()
    }
}

pub fn fake_kubeconfig() -> String {
    r#"
apiVersion: v1
kind: Config
current-context: fake-context
clusters:
- name: fake-cluster
  cluster:
    server: https://api.fake-unit-test-data.origin-ci-int-gce.dev.rhcloud.com:6443
contexts:
- name: fake-context
  context:
    cluster: fake-cluster
    user: fake-user
users:
- name: fake-user
  user:
    token: fake-token
"#
    .to_string()
}

/// Polls until `predicate` returns true or the timeout elapses.
pub async fn wait_for<F>(mut predicate: F, timeout: Duration, what: &str)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
