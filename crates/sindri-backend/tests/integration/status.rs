/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Deployment status tick: mirroring ApplicationState onto `.status`.

use sindri_models::api::{
    conditions, ResourceStatus, CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE,
    HEALTH_STATUS_HEALTHY, SYNC_STATUS_SYNCED,
};
use sindri_models::models::ApplicationState;
use sindri_utils::compression::compress_object;

use crate::fixtures::{TestFixture, WORKSPACE_NAMESPACE};

fn sample_application_state(application_id: &str, reconciled_state: &str) -> ApplicationState {
    let resources = vec![ResourceStatus::default()];
    let compressed_resources = compress_object(&resources).unwrap();

    let operation_state = serde_json::json!({
        "message": "Sample message",
        "retryCount": 1,
        "operation": { "initiatedBy": { "automated": true } }
    });
    let compressed_operation_state = compress_object(&operation_state).unwrap();

    let conditions_yaml = "- type: ComparisonError\n  message: comparision error\n- type: SharedResourceWarning\n  message: shared resource warning\n";

    ApplicationState {
        applicationstate_application_id: application_id.to_string(),
        health: HEALTH_STATUS_HEALTHY.to_string(),
        sync_status: SYNC_STATUS_SYNCED.to_string(),
        revision: "abcdefg".to_string(),
        message: "Success".to_string(),
        resources: Some(compressed_resources),
        reconciled_state: reconciled_state.to_string(),
        operation_state: Some(compressed_operation_state),
        conditions: Some(conditions_yaml.as_bytes().to_vec()),
    }
}

#[tokio::test]
async fn test_status_tick_mirrors_application_state_once() {
    let fixture = TestFixture::new();
    fixture
        .seed_deployment(
            "my-gitops-depl",
            "resources/test-data/sample-gitops-repository/environments/overlays/dev",
        )
        .await;

    let runner = fixture.runner("my-gitops-depl");
    runner.handle_deployment_modified().await.unwrap();

    let mapping = fixture.deployment_mapping("my-gitops-depl").unwrap();

    let reconciled_state = serde_json::json!({
        "source": {
            "repoURL": "https://github.com/test/test",
            "path": "resources/test-data/sample-gitops-repository/environments/overlays/dev",
            "targetRevision": "HEAD"
        },
        "destination": { "namespace": "jane", "name": "" }
    })
    .to_string();
    fixture
        .db
        .create_application_state(&sample_application_state(
            &mapping.application_id,
            &reconciled_state,
        ))
        .unwrap();

    // Before the tick, the status is empty.
    let deployment = fixture.current_deployment("my-gitops-depl").await;
    assert!(deployment.status.health.status.is_empty());
    assert!(deployment.status.sync.revision.is_empty());
    assert!(deployment.status.conditions.is_empty());
    assert!(deployment.status.operation_state.is_none());

    let updated = runner
        .handle_update_deployment_status_tick("my-gitops-depl", WORKSPACE_NAMESPACE)
        .await
        .unwrap();
    assert!(updated);

    let deployment = fixture.current_deployment("my-gitops-depl").await;
    assert_eq!(deployment.status.health.status, HEALTH_STATUS_HEALTHY);
    assert_eq!(deployment.status.health.message, "Success");
    assert_eq!(deployment.status.sync.status, SYNC_STATUS_SYNCED);
    assert_eq!(deployment.status.sync.revision, "abcdefg");
    assert_eq!(
        deployment.status.reconciled_state.source.repo_url,
        "https://github.com/test/test"
    );
    assert_eq!(deployment.status.reconciled_state.destination.namespace, "jane");
    assert_eq!(deployment.status.resources.len(), 1);

    let operation_state = deployment.status.operation_state.as_ref().unwrap();
    assert_eq!(operation_state["message"], "Sample message");
    assert_eq!(operation_state["retryCount"], 1);

    for condition_type in ["ComparisonError", "SharedResourceWarning"] {
        let condition =
            conditions::find_condition(&deployment.status.conditions, condition_type)
                .expect("engine condition should be mirrored");
        assert_eq!(condition.status, CONDITION_STATUS_TRUE);
        assert!(!condition.message.is_empty());
    }

    // A second tick with no state change issues no write.
    let updated = runner
        .handle_update_deployment_status_tick("my-gitops-depl", WORKSPACE_NAMESPACE)
        .await
        .unwrap();
    assert!(!updated);

    // Clearing the conditions in the state flips them to False...
    let mut cleared = sample_application_state(&mapping.application_id, &reconciled_state);
    cleared.conditions = None;
    fixture.db.update_application_state(&cleared).unwrap();

    let updated = runner
        .handle_update_deployment_status_tick("my-gitops-depl", WORKSPACE_NAMESPACE)
        .await
        .unwrap();
    assert!(updated);

    let deployment = fixture.current_deployment("my-gitops-depl").await;
    for condition in &deployment.status.conditions {
        assert_eq!(condition.status, CONDITION_STATUS_FALSE);
        assert!(condition.message.is_empty());
    }

    // ...and then the tick is quiescent again.
    let updated = runner
        .handle_update_deployment_status_tick("my-gitops-depl", WORKSPACE_NAMESPACE)
        .await
        .unwrap();
    assert!(!updated);
}

#[tokio::test]
async fn test_status_tick_without_rows_reports_no_update() {
    let fixture = TestFixture::new();
    fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;

    let runner = fixture.runner("my-gitops-depl");

    // No mapping at all.
    let updated = runner
        .handle_update_deployment_status_tick("my-gitops-depl", WORKSPACE_NAMESPACE)
        .await
        .unwrap();
    assert!(!updated);

    // Mapping but no ApplicationState row.
    runner.handle_deployment_modified().await.unwrap();
    let updated = runner
        .handle_update_deployment_status_tick("my-gitops-depl", WORKSPACE_NAMESPACE)
        .await
        .unwrap();
    assert!(!updated);
}

#[tokio::test]
async fn test_status_tick_resolves_destination_name_to_environment_resource() {
    let fixture = TestFixture::new();
    fixture.seed_managed_environment("my-managed-env", "my-env-secret");

    let mut deployment = fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;
    deployment.spec.destination.environment = "my-managed-env".to_string();
    fixture.client.put_gitops_deployment(deployment);

    let runner = fixture.runner("my-gitops-depl");
    runner.handle_deployment_modified().await.unwrap();

    let mapping = fixture.deployment_mapping("my-gitops-depl").unwrap();
    let application = fixture
        .db
        .get_application_by_id_unchecked(&mapping.application_id)
        .unwrap()
        .unwrap();
    assert!(!application.managed_environment_id.is_empty());

    // The agent stores the ManagedEnvironment row id as the destination name.
    let reconciled_state = serde_json::json!({
        "source": { "repoURL": "https://github.com/test/test", "path": "p", "targetRevision": "HEAD" },
        "destination": { "namespace": "jane", "name": application.managed_environment_id }
    })
    .to_string();
    fixture
        .db
        .create_application_state(&sample_application_state(
            &mapping.application_id,
            &reconciled_state,
        ))
        .unwrap();

    let updated = runner
        .handle_update_deployment_status_tick("my-gitops-depl", WORKSPACE_NAMESPACE)
        .await
        .unwrap();
    assert!(updated);

    // The user sees the resource name, not the row id.
    let deployment = fixture.current_deployment("my-gitops-depl").await;
    assert_eq!(
        deployment.status.reconciled_state.destination.name,
        "my-managed-env"
    );
}
