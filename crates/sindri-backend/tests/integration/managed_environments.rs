/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Managed environment lifecycle as observed from the deployment handler.

use sindri_backend::eventloop::application_event_runner::DeploymentModifiedResult;
use sindri_models::models::operations::OPERATION_RESOURCE_TYPE_APPLICATION;

use crate::fixtures::{TestFixture, WORKSPACE_NAMESPACE};

#[tokio::test]
async fn test_deployment_binds_to_managed_environment_and_survives_its_deletion() {
    let fixture = TestFixture::new();
    fixture.seed_managed_environment("my-managed-env", "my-env-secret");

    let mut deployment = fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;
    deployment.spec.destination.environment = "my-managed-env".to_string();
    fixture.client.put_gitops_deployment(deployment);

    let runner = fixture.runner("my-gitops-depl");
    let DeploymentModifiedResult::Created(application) =
        runner.handle_deployment_modified().await.unwrap()
    else {
        panic!("expected creation");
    };
    assert!(!application.managed_environment_id.is_empty());

    // Delete the environment resource and its secret; the application row
    // persists but falls back to the local target.
    fixture
        .client
        .remove_managed_environment(WORKSPACE_NAMESPACE, "my-managed-env");
    fixture
        .client
        .remove_secret(WORKSPACE_NAMESPACE, "my-env-secret");

    let DeploymentModifiedResult::Updated(updated) =
        runner.handle_deployment_modified().await.unwrap()
    else {
        panic!("expected update");
    };
    assert_eq!(updated.application_id, application.application_id);
    assert_eq!(updated.managed_environment_id, "");

    // The environment rows themselves are gone.
    assert!(fixture
        .db
        .get_managed_environment_by_id_unchecked(&application.managed_environment_id)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_switching_destination_environment_updates_row_and_adds_one_operation() {
    let fixture = TestFixture::new();
    fixture.seed_managed_environment("my-managed-env", "my-env-secret");

    fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;

    let runner = fixture.runner("my-gitops-depl");
    let DeploymentModifiedResult::Created(application) =
        runner.handle_deployment_modified().await.unwrap()
    else {
        panic!("expected creation");
    };
    assert_eq!(application.managed_environment_id, "");

    let mut deployment = fixture.current_deployment("my-gitops-depl").await;
    deployment.spec.destination.environment = "my-managed-env".to_string();
    fixture.client.put_gitops_deployment(deployment);

    let DeploymentModifiedResult::Updated(updated) =
        runner.handle_deployment_modified().await.unwrap()
    else {
        panic!("expected update");
    };
    assert_eq!(updated.application_id, application.application_id);
    assert!(!updated.managed_environment_id.is_empty());

    let operations = fixture
        .db
        .list_operations_by_resource_id_and_type(
            &application.application_id,
            OPERATION_RESOURCE_TYPE_APPLICATION,
        )
        .unwrap();
    assert_eq!(operations.len(), 2, "create + environment switch");
}

#[tokio::test]
async fn test_invalid_environment_credentials_are_a_user_error() {
    let fixture = TestFixture::new();
    // Environment exists but references a secret that was never created.
    fixture.seed_managed_environment("my-managed-env", "my-env-secret");
    fixture
        .client
        .remove_secret(WORKSPACE_NAMESPACE, "my-env-secret");

    let mut deployment = fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;
    deployment.spec.destination.environment = "my-managed-env".to_string();
    fixture.client.put_gitops_deployment(deployment);

    let err = fixture
        .runner("my-gitops-depl")
        .handle_deployment_modified()
        .await
        .unwrap_err();
    assert!(err.is_user_error());
    assert!(!err.is_retryable());
}
