/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! End-to-end flow through the lane hierarchy: raw reconcile requests in,
//! database rows out, including the managed environment fan-out path.

use std::time::Duration;

use sindri_backend::eventloop::preprocess_event_loop::{
    PreprocessEventLoop, PreprocessEventLoopConfig,
};
use sindri_models::api::{KIND_GITOPS_DEPLOYMENT, KIND_MANAGED_ENVIRONMENT, KIND_SECRET};

use crate::fixtures::{wait_for, TestFixture, WORKSPACE_NAMESPACE};

fn preprocess_loop(fixture: &TestFixture) -> PreprocessEventLoop {
    PreprocessEventLoop::new(
        fixture.db.clone(),
        PreprocessEventLoopConfig {
            // Effectively disabled so repeated sends in one test don't drop.
            debounce_window: Duration::from_millis(1),
            status_tick_period: Duration::from_secs(3600),
        },
    )
}

#[tokio::test]
async fn test_reconcile_request_flows_to_application_row() {
    let fixture = TestFixture::new();
    fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;

    let preprocess = preprocess_loop(&fixture);
    preprocess.handle_reconcile_request(
        KIND_GITOPS_DEPLOYMENT,
        WORKSPACE_NAMESPACE,
        "my-gitops-depl",
        fixture.client.clone(),
    );

    wait_for(
        || fixture.deployment_mapping("my-gitops-depl").is_some(),
        Duration::from_secs(5),
        "application row to be created",
    )
    .await;
}

#[tokio::test]
async fn test_deleting_the_deployment_tears_rows_down_through_the_lanes() {
    let fixture = TestFixture::new();
    fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;

    let preprocess = preprocess_loop(&fixture);
    preprocess.handle_reconcile_request(
        KIND_GITOPS_DEPLOYMENT,
        WORKSPACE_NAMESPACE,
        "my-gitops-depl",
        fixture.client.clone(),
    );
    wait_for(
        || fixture.deployment_mapping("my-gitops-depl").is_some(),
        Duration::from_secs(5),
        "application row to be created",
    )
    .await;

    fixture
        .client
        .remove_gitops_deployment(WORKSPACE_NAMESPACE, "my-gitops-depl");
    tokio::time::sleep(Duration::from_millis(20)).await;
    preprocess.handle_reconcile_request(
        KIND_GITOPS_DEPLOYMENT,
        WORKSPACE_NAMESPACE,
        "my-gitops-depl",
        fixture.client.clone(),
    );

    wait_for(
        || fixture.deployment_mapping("my-gitops-depl").is_none(),
        Duration::from_secs(5),
        "application row to be torn down",
    )
    .await;

    // The lane was reaped; a fresh request respawns it and recreates rows.
    fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    preprocess.handle_reconcile_request(
        KIND_GITOPS_DEPLOYMENT,
        WORKSPACE_NAMESPACE,
        "my-gitops-depl",
        fixture.client.clone(),
    );
    wait_for(
        || fixture.deployment_mapping("my-gitops-depl").is_some(),
        Duration::from_secs(5),
        "application row to be recreated",
    )
    .await;
}

#[tokio::test]
async fn test_managed_environment_event_fans_out_to_referencing_deployment() {
    let fixture = TestFixture::new();

    // Deployment references an environment that does not exist yet, so the
    // application row starts with an empty environment id.
    let mut deployment = fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;
    deployment.spec.destination.environment = "my-managed-env".to_string();
    fixture.client.put_gitops_deployment(deployment);

    let preprocess = preprocess_loop(&fixture);
    preprocess.handle_reconcile_request(
        KIND_GITOPS_DEPLOYMENT,
        WORKSPACE_NAMESPACE,
        "my-gitops-depl",
        fixture.client.clone(),
    );

    wait_for(
        || {
            fixture
                .deployment_mapping("my-gitops-depl")
                .and_then(|m| {
                    fixture
                        .db
                        .get_application_by_id_unchecked(&m.application_id)
                        .unwrap()
                })
                .is_some_and(|app| app.managed_environment_id.is_empty())
        },
        Duration::from_secs(5),
        "application row without an environment",
    )
    .await;

    // Now the environment appears. Its event goes to the workspace resource
    // loop, which reconciles the rows and fans back out to the deployment.
    fixture.seed_managed_environment("my-managed-env", "my-env-secret");
    preprocess.handle_reconcile_request(
        KIND_MANAGED_ENVIRONMENT,
        WORKSPACE_NAMESPACE,
        "my-managed-env",
        fixture.client.clone(),
    );

    wait_for(
        || {
            fixture
                .deployment_mapping("my-gitops-depl")
                .and_then(|m| {
                    fixture
                        .db
                        .get_application_by_id_unchecked(&m.application_id)
                        .unwrap()
                })
                .is_some_and(|app| !app.managed_environment_id.is_empty())
        },
        Duration::from_secs(5),
        "application row to bind to the environment",
    )
    .await;
}

#[tokio::test]
async fn test_managed_environment_secret_change_reaches_the_deployment() {
    let fixture = TestFixture::new();
    fixture.seed_managed_environment("my-managed-env", "my-env-secret");

    let mut deployment = fixture
        .seed_deployment("my-gitops-depl", "environments/overlays/dev")
        .await;
    deployment.spec.destination.environment = "my-managed-env".to_string();
    fixture.client.put_gitops_deployment(deployment);

    let preprocess = preprocess_loop(&fixture);
    preprocess.handle_reconcile_request(
        KIND_GITOPS_DEPLOYMENT,
        WORKSPACE_NAMESPACE,
        "my-gitops-depl",
        fixture.client.clone(),
    );
    wait_for(
        || fixture.deployment_mapping("my-gitops-depl").is_some(),
        Duration::from_secs(5),
        "application row to be created",
    )
    .await;

    // A Secret event maps (via the environments that reference it) to the
    // managed environment, and from there back to the deployment lane.
    preprocess.handle_reconcile_request(
        KIND_SECRET,
        WORKSPACE_NAMESPACE,
        "my-env-secret",
        fixture.client.clone(),
    );

    // The fan-out re-reconciles the environment; observable as the rows
    // staying consistent (same environment id) rather than duplicating.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let mapping = fixture.deployment_mapping("my-gitops-depl").unwrap();
    let application = fixture
        .db
        .get_application_by_id_unchecked(&mapping.application_id)
        .unwrap()
        .unwrap();
    assert!(!application.managed_environment_id.is_empty());
    assert!(fixture
        .db
        .get_managed_environment_by_id_unchecked(&application.managed_environment_id)
        .unwrap()
        .is_some());
}
