/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Deployment reconciliation: row creation, user errors surfaced as
//! conditions, teardown, and finalizer handling.

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

use sindri_backend::errors::UserError;
use sindri_backend::eventloop::application_event_runner::DeploymentModifiedResult;
use sindri_models::api::{
    conditions, CONDITION_ERROR_OCCURRED, CONDITION_REASON_RECONCILE_ERROR_RESOLVED,
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, DELETION_FINALIZER,
};
use sindri_models::models::operations::OPERATION_RESOURCE_TYPE_APPLICATION;

use crate::fixtures::TestFixture;

#[tokio::test]
async fn test_deployment_creates_application_mapping_and_operation() {
    let fixture = TestFixture::new();
    fixture
        .seed_deployment(
            "my-gitops-depl",
            "resources/test-data/sample-gitops-repository/environments/overlays/dev",
        )
        .await;

    let result = fixture
        .runner("my-gitops-depl")
        .handle_deployment_modified()
        .await
        .unwrap();
    let DeploymentModifiedResult::Created(application) = result else {
        panic!("expected the application to be created, got {:?}", result);
    };

    // Exactly one mapping binds the deployment to the application row.
    let mapping = fixture
        .deployment_mapping("my-gitops-depl")
        .expect("mapping should exist");
    assert_eq!(mapping.application_id, application.application_id);

    // The mutation was paired with an Operation for the agent.
    let operations = fixture
        .db
        .list_operations_by_resource_id_and_type(
            &application.application_id,
            OPERATION_RESOURCE_TYPE_APPLICATION,
        )
        .unwrap();
    assert_eq!(operations.len(), 1);
    assert!(!fixture.client.operation_resources().is_empty());

    // Reconciling again with no change is a no-op.
    let again = fixture
        .runner("my-gitops-depl")
        .handle_deployment_modified()
        .await
        .unwrap();
    assert!(matches!(again, DeploymentModifiedResult::Unchanged(_)));
    let operations = fixture
        .db
        .list_operations_by_resource_id_and_type(
            &application.application_id,
            OPERATION_RESOURCE_TYPE_APPLICATION,
        )
        .unwrap();
    assert_eq!(operations.len(), 1);
}

#[tokio::test]
async fn test_empty_path_reports_error_condition_and_recovers() {
    let fixture = TestFixture::new();
    fixture.seed_deployment("my-gitops-depl", "").await;

    let err = fixture
        .runner("my-gitops-depl")
        .handle_deployment_modified()
        .await
        .unwrap_err();
    assert_eq!(err.user_error(), Some(&UserError::PathIsRequired));

    let deployment = fixture.current_deployment("my-gitops-depl").await;
    let condition =
        conditions::find_condition(&deployment.status.conditions, CONDITION_ERROR_OCCURRED)
            .expect("ErrorOccurred condition should be set");
    assert_eq!(condition.status, CONDITION_STATUS_TRUE);

    // '/' is rejected as well.
    let mut deployment = fixture.current_deployment("my-gitops-depl").await;
    deployment.spec.source.path = "/".to_string();
    fixture.client.put_gitops_deployment(deployment);
    let err = fixture
        .runner("my-gitops-depl")
        .handle_deployment_modified()
        .await
        .unwrap_err();
    assert_eq!(err.user_error(), Some(&UserError::InvalidPathSlash));

    // Correcting the path clears the condition.
    let mut deployment = fixture.current_deployment("my-gitops-depl").await;
    deployment.spec.source.path =
        "resources/test-data/sample-gitops-repository/environments/overlays/dev".to_string();
    fixture.client.put_gitops_deployment(deployment);

    fixture
        .runner("my-gitops-depl")
        .handle_deployment_modified()
        .await
        .unwrap();

    let deployment = fixture.current_deployment("my-gitops-depl").await;
    let condition =
        conditions::find_condition(&deployment.status.conditions, CONDITION_ERROR_OCCURRED)
            .expect("condition should remain, toggled off");
    assert_eq!(condition.status, CONDITION_STATUS_FALSE);
    assert_eq!(condition.reason, CONDITION_REASON_RECONCILE_ERROR_RESOLVED);
}

#[tokio::test]
async fn test_deleted_deployment_tears_down_rows_and_emits_gc_operation() {
    let fixture = TestFixture::new();
    fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;

    let runner = fixture.runner("my-gitops-depl");
    let DeploymentModifiedResult::Created(application) =
        runner.handle_deployment_modified().await.unwrap()
    else {
        panic!("expected creation");
    };

    fixture
        .client
        .remove_gitops_deployment(crate::fixtures::WORKSPACE_NAMESPACE, "my-gitops-depl");

    let create_operation_id = fixture
        .db
        .list_operations_by_resource_id_and_type(
            &application.application_id,
            OPERATION_RESOURCE_TYPE_APPLICATION,
        )
        .unwrap()[0]
        .operation_id
        .clone();

    let result = runner.handle_deployment_modified().await.unwrap();
    assert_eq!(result, DeploymentModifiedResult::Deleted);

    assert!(fixture.deployment_mapping("my-gitops-depl").is_none());
    assert!(fixture
        .db
        .get_application_by_id_unchecked(&application.application_id)
        .unwrap()
        .is_none());

    // The pending create operation was cleaned up (row and resource); only
    // the GC operation remains.
    let operations = fixture
        .db
        .list_operations_by_resource_id_and_type(
            &application.application_id,
            OPERATION_RESOURCE_TYPE_APPLICATION,
        )
        .unwrap();
    assert_eq!(operations.len(), 1);
    assert_ne!(operations[0].operation_id, create_operation_id);

    let operation_resources = fixture.client.operation_resources();
    assert_eq!(operation_resources.len(), 1);
    assert_eq!(
        operation_resources[0].spec.operation_id,
        operations[0].operation_id
    );

    // A second pass finds nothing to do.
    let result = runner.handle_deployment_modified().await.unwrap();
    assert_eq!(result, DeploymentModifiedResult::Missing);
}

#[tokio::test]
async fn test_finalizer_removal_retries_through_conflicts() {
    let fixture = TestFixture::new();
    fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;

    let runner = fixture.runner("my-gitops-depl");
    runner.handle_deployment_modified().await.unwrap();

    let mut deployment = fixture.current_deployment("my-gitops-depl").await;
    deployment.metadata.finalizers = Some(vec![DELETION_FINALIZER.to_string()]);
    deployment.metadata.deletion_timestamp = Some(Time(Utc::now()));
    fixture.client.put_gitops_deployment(deployment);

    // A concurrent writer races the first two strip attempts.
    fixture.client.inject_update_conflicts(2);

    let result = runner.handle_deployment_modified().await.unwrap();
    assert_eq!(result, DeploymentModifiedResult::Deleted);

    let deployment = fixture.current_deployment("my-gitops-depl").await;
    assert!(deployment
        .metadata
        .finalizers
        .as_deref()
        .unwrap_or_default()
        .is_empty());
}
