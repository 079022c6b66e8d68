/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Application Event Runner: sync run reconciliation
//!
//! GitOpsDeploymentSyncRun resources reconcile into SyncOperation rows with
//! the same create/compare/update discipline as deployments: an
//! APICRToDatabaseMapping binds the resource UID to the row, and every row
//! mutation emits an Operation for the cluster agent.

use tracing::info;

use sindri_models::api::MAX_NAME_LENGTH;
use sindri_models::models::mappings::{
    API_RESOURCE_TYPE_SYNC_RUN, DB_RELATION_TYPE_SYNC_OPERATION,
};
use sindri_models::models::operations::OPERATION_RESOURCE_TYPE_SYNC_OPERATION;
use sindri_models::models::sync_operations::SYNC_OPERATION_DESIRED_STATE_RUNNING;
use sindri_models::models::{APICRToDatabaseMapping, Application, Operation, SyncOperation};

use crate::errors::{ReconcileError, UserError};
use crate::operations;

use super::application_event_runner::ApplicationEventRunner;

impl ApplicationEventRunner {
    /// Reconciles the sync run named by `event_resource_name` into its
    /// SyncOperation row.
    pub async fn handle_sync_run_modified(&self) -> Result<(), ReconcileError> {
        if self.event_resource_name.len() > MAX_NAME_LENGTH {
            return Err(UserError::SyncRunNameTooLong.into());
        }

        let sync_run = self
            .workspace_client
            .get_sync_run(&self.event_resource_namespace, &self.event_resource_name)
            .await?;

        let Some(sync_run) = sync_run else {
            return self.teardown_sync_run_rows().await;
        };

        let resource_uid = sync_run.metadata.uid.clone().unwrap_or_default();
        if resource_uid.is_empty() {
            return Err(ReconcileError::Severe(format!(
                "sync run {}/{} has no uid",
                self.event_resource_namespace, self.event_resource_name
            )));
        }

        let mapping = self.db.get_api_cr_to_database_mapping(
            API_RESOURCE_TYPE_SYNC_RUN,
            &resource_uid,
            DB_RELATION_TYPE_SYNC_OPERATION,
        )?;

        if let Some(existing_mapping) = mapping {
            match self
                .db
                .get_sync_operation_by_id(&existing_mapping.db_relation_key)?
            {
                Some(sync_operation) => {
                    if sync_operation.revision == sync_run.spec.revision_id {
                        return Ok(());
                    }

                    // Same sync run, new revision: update the row and wake
                    // the agent.
                    let application =
                        self.application_for_sync_operation(&sync_operation)?;
                    let updated = SyncOperation {
                        revision: sync_run.spec.revision_id.clone(),
                        desired_state: SYNC_OPERATION_DESIRED_STATE_RUNNING.to_string(),
                        ..sync_operation
                    };
                    self.db.update_sync_operation(&updated)?;
                    self.create_sync_operation_operation(&application, &updated)
                        .await?;
                    info!(
                        sync_operation_id = %updated.syncoperation_id,
                        "updated sync operation revision"
                    );
                    return Ok(());
                }
                None => {
                    // Stale mapping; drop it and recreate the full set below.
                    self.db
                        .delete_api_cr_to_database_mapping(&existing_mapping)?;
                }
            }
        }

        let deployment_name = sync_run.spec.gitops_deployment_name.clone();
        if deployment_name.is_empty() {
            return Err(UserError::SyncRunMissingDeployment(String::new()).into());
        }

        let deployment_mapping = self
            .db
            .list_deployment_to_application_mappings_by_namespace_and_name(
                &deployment_name,
                &self.event_resource_namespace,
                &self.workspace_id,
            )?
            .into_iter()
            .next()
            .ok_or_else(|| UserError::SyncRunMissingDeployment(deployment_name.clone()))?;

        let application = self
            .db
            .get_application_by_id_unchecked(&deployment_mapping.application_id)?
            .ok_or_else(|| UserError::SyncRunMissingDeployment(deployment_name.clone()))?;

        let sync_operation = SyncOperation::new(
            application.application_id.clone(),
            deployment_name,
            sync_run.spec.revision_id.clone(),
        );
        self.db.create_sync_operation(&sync_operation)?;

        self.db
            .create_api_cr_to_database_mapping(&APICRToDatabaseMapping {
                api_resource_type: API_RESOURCE_TYPE_SYNC_RUN.to_string(),
                api_resource_uid: resource_uid,
                api_resource_name: self.event_resource_name.clone(),
                api_resource_namespace: self.event_resource_namespace.clone(),
                namespace_uid: self.workspace_id.clone(),
                db_relation_type: DB_RELATION_TYPE_SYNC_OPERATION.to_string(),
                db_relation_key: sync_operation.syncoperation_id.clone(),
            })?;

        self.create_sync_operation_operation(&application, &sync_operation)
            .await?;

        info!(
            sync_operation_id = %sync_operation.syncoperation_id,
            "created sync operation"
        );
        Ok(())
    }

    /// The sync run resource is gone: delete its rows and mappings, and
    /// notify the agent for each row removed. Operations still pending
    /// against a doomed row are unserviceable and are cleaned up first.
    async fn teardown_sync_run_rows(&self) -> Result<(), ReconcileError> {
        let mappings = self.db.list_api_cr_to_database_mappings_for_api_resource(
            API_RESOURCE_TYPE_SYNC_RUN,
            &self.event_resource_name,
            &self.event_resource_namespace,
            &self.workspace_id,
        )?;

        for mapping in mappings
            .iter()
            .filter(|m| m.db_relation_type == DB_RELATION_TYPE_SYNC_OPERATION)
        {
            if let Some(sync_operation) =
                self.db.get_sync_operation_by_id(&mapping.db_relation_key)?
            {
                for operation in self.db.list_operations_by_resource_id_and_type(
                    &sync_operation.syncoperation_id,
                    OPERATION_RESOURCE_TYPE_SYNC_OPERATION,
                )? {
                    operations::cleanup_operation(&self.db, &self.workspace_client, &operation)
                        .await?;
                }
                self.db
                    .delete_sync_operation_by_id(&sync_operation.syncoperation_id)?;

                if let Ok(application) = self.application_for_sync_operation(&sync_operation) {
                    self.create_sync_operation_operation(&application, &sync_operation)
                        .await?;
                }
                info!(
                    sync_operation_id = %sync_operation.syncoperation_id,
                    "deleted sync operation for removed sync run"
                );
            }
            self.db.delete_api_cr_to_database_mapping(mapping)?;
        }

        Ok(())
    }

    fn application_for_sync_operation(
        &self,
        sync_operation: &SyncOperation,
    ) -> Result<Application, ReconcileError> {
        self.db
            .get_application_by_id_unchecked(&sync_operation.application_id)?
            .ok_or_else(|| {
                ReconcileError::Severe(format!(
                    "sync operation {} references missing application {}",
                    sync_operation.syncoperation_id, sync_operation.application_id
                ))
            })
    }

    async fn create_sync_operation_operation(
        &self,
        application: &Application,
        sync_operation: &SyncOperation,
    ) -> Result<(), ReconcileError> {
        let user = self
            .shared_resource_loop
            .get_or_create_cluster_user_by_namespace_uid(&self.workspace_id)
            .await?;

        let operation = Operation::new(
            application.engine_instance_inst_id.clone(),
            sync_operation.syncoperation_id.clone(),
            OPERATION_RESOURCE_TYPE_SYNC_OPERATION,
            user.clusteruser_id.clone(),
        )
        .map_err(ReconcileError::Severe)?;

        operations::create_operation(&self.db, &self.workspace_client, operation).await?;
        Ok(())
    }
}
