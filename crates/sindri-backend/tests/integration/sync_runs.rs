/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Sync run reconciliation into SyncOperation rows.

use sindri_backend::cluster::WorkspaceClient;
use sindri_backend::errors::UserError;
use sindri_models::models::mappings::{
    API_RESOURCE_TYPE_SYNC_RUN, DB_RELATION_TYPE_SYNC_OPERATION,
};
use sindri_models::models::operations::OPERATION_RESOURCE_TYPE_SYNC_OPERATION;

use crate::fixtures::{TestFixture, WORKSPACE_NAMESPACE};

#[tokio::test]
async fn test_sync_run_creates_sync_operation_row_and_mapping() {
    let fixture = TestFixture::new();
    fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;
    fixture
        .runner("my-gitops-depl")
        .handle_deployment_modified()
        .await
        .unwrap();

    fixture.seed_sync_run("my-gitops-depl-sync", "my-gitops-depl", "HEAD");

    fixture
        .runner("my-gitops-depl-sync")
        .handle_sync_run_modified()
        .await
        .unwrap();

    let run = fixture
        .client
        .get_sync_run(WORKSPACE_NAMESPACE, "my-gitops-depl-sync")
        .await
        .unwrap()
        .unwrap();
    let mapping = fixture
        .db
        .get_api_cr_to_database_mapping(
            API_RESOURCE_TYPE_SYNC_RUN,
            run.metadata.uid.as_deref().unwrap(),
            DB_RELATION_TYPE_SYNC_OPERATION,
        )
        .unwrap()
        .expect("sync run should map to a sync operation row");

    let sync_operation = fixture
        .db
        .get_sync_operation_by_id(&mapping.db_relation_key)
        .unwrap()
        .expect("sync operation row should exist");
    assert_eq!(sync_operation.deployment_name, "my-gitops-depl");
    assert_eq!(sync_operation.revision, "HEAD");

    let operations = fixture
        .db
        .list_operations_by_resource_id_and_type(
            &sync_operation.syncoperation_id,
            OPERATION_RESOURCE_TYPE_SYNC_OPERATION,
        )
        .unwrap();
    assert_eq!(operations.len(), 1);

    // Reconciling the same revision again is a no-op.
    fixture
        .runner("my-gitops-depl-sync")
        .handle_sync_run_modified()
        .await
        .unwrap();
    let operations = fixture
        .db
        .list_operations_by_resource_id_and_type(
            &sync_operation.syncoperation_id,
            OPERATION_RESOURCE_TYPE_SYNC_OPERATION,
        )
        .unwrap();
    assert_eq!(operations.len(), 1);
}

#[tokio::test]
async fn test_overlong_sync_run_name_is_a_non_retryable_user_error() {
    let fixture = TestFixture::new();
    fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;
    fixture
        .runner("my-gitops-depl")
        .handle_deployment_modified()
        .await
        .unwrap();

    let long_name = "abc".repeat(100);
    fixture.seed_sync_run(&long_name, "my-gitops-depl", "HEAD");

    let err = fixture
        .runner(&long_name)
        .handle_sync_run_modified()
        .await
        .unwrap_err();
    assert_eq!(err.user_error(), Some(&UserError::SyncRunNameTooLong));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_sync_run_for_missing_deployment_is_a_user_error() {
    let fixture = TestFixture::new();
    fixture.seed_sync_run("my-gitops-depl-sync", "no-such-depl", "HEAD");

    let err = fixture
        .runner("my-gitops-depl-sync")
        .handle_sync_run_modified()
        .await
        .unwrap_err();
    assert!(matches!(
        err.user_error(),
        Some(UserError::SyncRunMissingDeployment(_))
    ));
}

#[tokio::test]
async fn test_deleted_sync_run_tears_down_row_and_mapping() {
    let fixture = TestFixture::new();
    fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;
    fixture
        .runner("my-gitops-depl")
        .handle_deployment_modified()
        .await
        .unwrap();

    fixture.seed_sync_run("my-gitops-depl-sync", "my-gitops-depl", "HEAD");
    fixture
        .runner("my-gitops-depl-sync")
        .handle_sync_run_modified()
        .await
        .unwrap();

    let run = fixture
        .client
        .get_sync_run(WORKSPACE_NAMESPACE, "my-gitops-depl-sync")
        .await
        .unwrap()
        .unwrap();
    let sync_operation_id = fixture
        .db
        .get_api_cr_to_database_mapping(
            API_RESOURCE_TYPE_SYNC_RUN,
            run.metadata.uid.as_deref().unwrap(),
            DB_RELATION_TYPE_SYNC_OPERATION,
        )
        .unwrap()
        .unwrap()
        .db_relation_key;
    let create_operation_id = fixture
        .db
        .list_operations_by_resource_id_and_type(
            &sync_operation_id,
            OPERATION_RESOURCE_TYPE_SYNC_OPERATION,
        )
        .unwrap()[0]
        .operation_id
        .clone();

    fixture
        .client
        .remove_sync_run(WORKSPACE_NAMESPACE, "my-gitops-depl-sync");
    fixture
        .runner("my-gitops-depl-sync")
        .handle_sync_run_modified()
        .await
        .unwrap();

    let mappings = fixture
        .db
        .list_api_cr_to_database_mappings_for_api_resource(
            API_RESOURCE_TYPE_SYNC_RUN,
            "my-gitops-depl-sync",
            WORKSPACE_NAMESPACE,
            crate::fixtures::WORKSPACE_UID,
        )
        .unwrap();
    assert!(mappings.is_empty());
    assert!(fixture
        .db
        .get_sync_operation_by_id(&sync_operation_id)
        .unwrap()
        .is_none());

    // The pending create operation was cleaned up; the single remaining
    // operation is the deletion notification for the agent.
    let operations = fixture
        .db
        .list_operations_by_resource_id_and_type(
            &sync_operation_id,
            OPERATION_RESOURCE_TYPE_SYNC_OPERATION,
        )
        .unwrap();
    assert_eq!(operations.len(), 1);
    assert_ne!(operations[0].operation_id, create_operation_id);
}
