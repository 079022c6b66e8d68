/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Application Event Runner: deployment reconciliation
//!
//! `handle_deployment_modified` drives one GitOpsDeployment to its database
//! representation: an Application row bound by a DeploymentToApplicationMapping,
//! with an Operation emitted whenever the serialized engine spec or the target
//! environment changes. The inverse direction (resource deleted) tears the
//! rows down and emits a GC Operation.
//!
//! User errors (invalid path, invalid environment credentials) are written to
//! the resource as an `ErrorOccurred` condition and cleared with reason
//! `ReconcileErrorResolved` once reconciliation succeeds again.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use sindri_models::api::{
    conditions, ApplicationSource, GitOpsDeployment, CONDITION_ERROR_OCCURRED,
    CONDITION_REASON_RECONCILE_ERROR, CONDITION_REASON_RECONCILE_ERROR_RESOLVED,
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, DELETION_FINALIZER,
    DEPLOYMENT_SPEC_TYPE_AUTOMATED,
};
use sindri_models::models::mappings::DB_RELATION_TYPE_SYNC_OPERATION;
use sindri_models::models::operations::{
    OPERATION_RESOURCE_TYPE_APPLICATION, OPERATION_RESOURCE_TYPE_SYNC_OPERATION,
};
use sindri_models::models::{
    Application, DeploymentToApplicationMapping, GitopsEngineInstance, Operation,
};

use crate::cluster::WorkspaceClient;
use crate::dal::DatabaseQueries;
use crate::errors::{ReconcileError, UserError};
use crate::eventloop::shared_resource_loop::{ApiNamespace, SharedResourceEventLoop};
use crate::operations;

/// Bounded attempts for optimistic-concurrency retries on resource writes.
pub(crate) const MAX_WRITE_ATTEMPTS: usize = 5;

/// Drives the three per-deployment reconcile actions. One runner exists per
/// application event loop lane.
pub struct ApplicationEventRunner {
    pub event_resource_name: String,
    pub event_resource_namespace: String,
    pub workspace_client: Arc<dyn WorkspaceClient>,
    pub shared_resource_loop: SharedResourceEventLoop,
    /// UID of the namespace the deployment lives in.
    pub workspace_id: String,
    pub db: Arc<dyn DatabaseQueries>,
}

/// What `handle_deployment_modified` did.
#[derive(Debug, Clone, PartialEq)]
pub enum DeploymentModifiedResult {
    /// Neither the resource nor any database rows exist.
    Missing,
    /// The resource is gone; rows were torn down. The lane may shut down.
    Deleted,
    Created(Application),
    Updated(Application),
    Unchanged(Application),
}

/// The canonical engine application descriptor serialized into
/// `Application.spec_field`. Field order is fixed by the struct, so equal
/// inputs serialize identically and row comparison is a string compare.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineApplication {
    pub name: String,
    pub namespace: String,
    pub spec: EngineApplicationSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineApplicationSpec {
    pub source: ApplicationSource,
    pub destination: EngineApplicationDestination,
    pub automated_sync: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineApplicationDestination {
    /// ManagedEnvironment row id, or empty for the deployment's own cluster.
    pub name: String,
    pub namespace: String,
}

impl ApplicationEventRunner {
    /// Reconciles the deployment, then mirrors the outcome onto the
    /// resource's `ErrorOccurred` condition.
    pub async fn handle_deployment_modified(
        &self,
    ) -> Result<DeploymentModifiedResult, ReconcileError> {
        let result = self.internal_handle_deployment_modified().await;

        match &result {
            Err(err) => {
                if let Some(user_error) = err.user_error() {
                    self.set_error_occurred_condition(&user_error.to_string())
                        .await?;
                }
            }
            Ok(_) => {
                self.clear_error_occurred_condition().await?;
            }
        }

        result
    }

    async fn internal_handle_deployment_modified(
        &self,
    ) -> Result<DeploymentModifiedResult, ReconcileError> {
        let deployment = self
            .workspace_client
            .get_gitops_deployment(&self.event_resource_namespace, &self.event_resource_name)
            .await?;

        let mapping = self
            .db
            .list_deployment_to_application_mappings_by_namespace_and_name(
                &self.event_resource_name,
                &self.event_resource_namespace,
                &self.workspace_id,
            )?
            .into_iter()
            .next();

        let Some(deployment) = deployment else {
            return match mapping {
                None => Ok(DeploymentModifiedResult::Missing),
                Some(mapping) => {
                    self.teardown_deployment_rows(&mapping).await?;
                    Ok(DeploymentModifiedResult::Deleted)
                }
            };
        };

        if deployment.metadata.deletion_timestamp.is_some() {
            if let Some(mapping) = mapping {
                self.teardown_deployment_rows(&mapping).await?;
            }
            self.remove_deletion_finalizer().await?;
            return Ok(DeploymentModifiedResult::Deleted);
        }

        validate_deployment_spec(&deployment)?;

        let namespace = ApiNamespace {
            name: self.event_resource_namespace.clone(),
            uid: self.workspace_id.clone(),
        };

        let shared = self
            .shared_resource_loop
            .get_or_create_shared_resources(self.workspace_client.clone(), namespace.clone())
            .await?;

        let environment_name = deployment.spec.destination.environment.clone();
        let managed_environment = self
            .shared_resource_loop
            .reconcile_shared_managed_env(
                self.workspace_client.clone(),
                namespace,
                &environment_name,
                environment_name.is_empty(),
            )
            .await?;
        let managed_environment_id = managed_environment
            .map(|env| env.managedenvironment_id)
            .unwrap_or_default();

        let deployment_uid = deployment.metadata.uid.clone().unwrap_or_default();
        if deployment_uid.is_empty() {
            return Err(ReconcileError::Severe(format!(
                "gitops deployment {}/{} has no uid",
                self.event_resource_namespace, self.event_resource_name
            )));
        }

        let spec_field = build_engine_application_spec_field(
            &deployment,
            &shared.engine_instance,
            &managed_environment_id,
        )?;

        match mapping {
            None => {
                let application = Application::new(
                    Application::name_for_deployment_uid(&deployment_uid),
                    spec_field,
                    shared.engine_instance.gitopsengineinstance_id.clone(),
                    managed_environment_id,
                );
                self.db.create_application(&application)?;

                self.db
                    .create_deployment_to_application_mapping(&DeploymentToApplicationMapping::new(
                        deployment_uid,
                        self.event_resource_name.clone(),
                        self.event_resource_namespace.clone(),
                        self.workspace_id.clone(),
                        application.application_id.clone(),
                    ))?;

                self.create_application_operation(&application, &shared.cluster_user.clusteruser_id)
                    .await?;

                info!(
                    application_id = %application.application_id,
                    "created application for gitops deployment"
                );
                Ok(DeploymentModifiedResult::Created(application))
            }
            Some(mapping) => {
                let Some(application) =
                    self.db.get_application_by_id_unchecked(&mapping.application_id)?
                else {
                    // An orphaned mapping is the database reconciler's to fix.
                    return Err(ReconcileError::Severe(format!(
                        "mapping for deployment {} references missing application {}",
                        self.event_resource_name, mapping.application_id
                    )));
                };

                if application.spec_field == spec_field
                    && application.managed_environment_id == managed_environment_id
                {
                    return Ok(DeploymentModifiedResult::Unchanged(application));
                }

                let updated = Application {
                    spec_field,
                    managed_environment_id,
                    engine_instance_inst_id: shared.engine_instance.gitopsengineinstance_id.clone(),
                    ..application
                };
                self.db.update_application(&updated)?;

                self.create_application_operation(&updated, &shared.cluster_user.clusteruser_id)
                    .await?;

                info!(
                    application_id = %updated.application_id,
                    "updated application for gitops deployment"
                );
                Ok(DeploymentModifiedResult::Updated(updated))
            }
        }
    }

    /// Deletes ApplicationState, SyncOperation rows (and their mappings), the
    /// Application row, and the deployment mapping, then emits a GC Operation
    /// so the agent removes the engine application. Operations still pending
    /// against the doomed rows are unserviceable and are cleaned up first.
    async fn teardown_deployment_rows(
        &self,
        mapping: &DeploymentToApplicationMapping,
    ) -> Result<(), ReconcileError> {
        let application = self
            .db
            .get_application_by_id_unchecked(&mapping.application_id)?;

        self.db
            .delete_application_state_by_id(&mapping.application_id)?;

        for sync_operation in self
            .db
            .list_sync_operations_by_application_id(&mapping.application_id)?
        {
            if let Some(sync_mapping) = self.db.get_api_cr_to_database_mapping_for_database_id(
                DB_RELATION_TYPE_SYNC_OPERATION,
                &sync_operation.syncoperation_id,
            )? {
                self.db.delete_api_cr_to_database_mapping(&sync_mapping)?;
            }
            for operation in self.db.list_operations_by_resource_id_and_type(
                &sync_operation.syncoperation_id,
                OPERATION_RESOURCE_TYPE_SYNC_OPERATION,
            )? {
                operations::cleanup_operation(&self.db, &self.workspace_client, &operation)
                    .await?;
            }
            self.db
                .delete_sync_operation_by_id(&sync_operation.syncoperation_id)?;
        }

        for operation in self.db.list_operations_by_resource_id_and_type(
            &mapping.application_id,
            OPERATION_RESOURCE_TYPE_APPLICATION,
        )? {
            operations::cleanup_operation(&self.db, &self.workspace_client, &operation).await?;
        }

        self.db.delete_application_by_id(&mapping.application_id)?;
        self.db.delete_deployment_to_application_mapping_by_id(
            &mapping.deploymenttoapplicationmapping_uid_id,
        )?;

        if let Some(application) = application {
            let user = self
                .shared_resource_loop
                .get_or_create_cluster_user_by_namespace_uid(&self.workspace_id)
                .await?;
            self.create_application_operation(&application, &user.clusteruser_id)
                .await?;
        }

        info!(
            application_id = %mapping.application_id,
            deployment = %self.event_resource_name,
            "tore down database rows for deleted gitops deployment"
        );
        Ok(())
    }

    async fn create_application_operation(
        &self,
        application: &Application,
        owner_user_id: &str,
    ) -> Result<Operation, ReconcileError> {
        let operation = Operation::new(
            application.engine_instance_inst_id.clone(),
            application.application_id.clone(),
            OPERATION_RESOURCE_TYPE_APPLICATION,
            owner_user_id.to_string(),
        )
        .map_err(ReconcileError::Severe)?;

        operations::create_operation(&self.db, &self.workspace_client, operation).await
    }

    /// Strips the managed deletion finalizer with bounded read-modify-write
    /// retry. Success is observing the finalizer absent, including when the
    /// object itself is gone.
    pub(crate) async fn remove_deletion_finalizer(&self) -> Result<(), ReconcileError> {
        let mut last_conflict = None;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let Some(mut deployment) = self
                .workspace_client
                .get_gitops_deployment(&self.event_resource_namespace, &self.event_resource_name)
                .await?
            else {
                return Ok(());
            };

            let Some(finalizers) = deployment.metadata.finalizers.as_mut() else {
                return Ok(());
            };
            let before = finalizers.len();
            finalizers.retain(|f| f != DELETION_FINALIZER);
            if finalizers.len() == before {
                return Ok(());
            }

            match self
                .workspace_client
                .update_gitops_deployment(&deployment)
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) if err.is_conflict() => {
                    warn!(
                        deployment = %self.event_resource_name,
                        "conflict removing deletion finalizer; re-reading"
                    );
                    last_conflict = Some(err);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(last_conflict
            .map(ReconcileError::from)
            .unwrap_or_else(|| ReconcileError::Severe("finalizer removal stalled".into())))
    }

    async fn set_error_occurred_condition(&self, message: &str) -> Result<(), ReconcileError> {
        let Some(mut deployment) = self
            .workspace_client
            .get_gitops_deployment(&self.event_resource_namespace, &self.event_resource_name)
            .await?
        else {
            return Ok(());
        };

        if let Some(existing) =
            conditions::find_condition(&deployment.status.conditions, CONDITION_ERROR_OCCURRED)
        {
            if existing.status == CONDITION_STATUS_TRUE && existing.message == message {
                return Ok(());
            }
        }

        conditions::set_condition(
            &mut deployment.status.conditions,
            CONDITION_ERROR_OCCURRED,
            CONDITION_STATUS_TRUE,
            CONDITION_REASON_RECONCILE_ERROR,
            message,
        );
        self.workspace_client
            .update_gitops_deployment_status(&deployment)
            .await?;
        Ok(())
    }

    async fn clear_error_occurred_condition(&self) -> Result<(), ReconcileError> {
        let Some(mut deployment) = self
            .workspace_client
            .get_gitops_deployment(&self.event_resource_namespace, &self.event_resource_name)
            .await?
        else {
            return Ok(());
        };

        let needs_clear = conditions::find_condition(
            &deployment.status.conditions,
            CONDITION_ERROR_OCCURRED,
        )
        .is_some_and(|c| c.status == CONDITION_STATUS_TRUE);
        if !needs_clear {
            return Ok(());
        }

        conditions::set_condition(
            &mut deployment.status.conditions,
            CONDITION_ERROR_OCCURRED,
            CONDITION_STATUS_FALSE,
            CONDITION_REASON_RECONCILE_ERROR_RESOLVED,
            "",
        );
        self.workspace_client
            .update_gitops_deployment_status(&deployment)
            .await?;
        Ok(())
    }
}

fn validate_deployment_spec(deployment: &GitOpsDeployment) -> Result<(), ReconcileError> {
    let path = &deployment.spec.source.path;
    if path.is_empty() {
        return Err(UserError::PathIsRequired.into());
    }
    if path == "/" {
        return Err(UserError::InvalidPathSlash.into());
    }
    Ok(())
}

/// Serializes the canonical engine application descriptor for comparison with
/// and storage in `Application.spec_field`.
fn build_engine_application_spec_field(
    deployment: &GitOpsDeployment,
    engine_instance: &GitopsEngineInstance,
    managed_environment_id: &str,
) -> Result<String, ReconcileError> {
    let deployment_namespace = deployment.metadata.namespace.clone().unwrap_or_default();
    let destination_namespace = if deployment.spec.destination.namespace.is_empty() {
        deployment_namespace
    } else {
        deployment.spec.destination.namespace.clone()
    };

    let engine_application = EngineApplication {
        name: Application::name_for_deployment_uid(
            deployment.metadata.uid.as_deref().unwrap_or_default(),
        ),
        namespace: engine_instance.namespace_name.clone(),
        spec: EngineApplicationSpec {
            source: deployment.spec.source.clone(),
            destination: EngineApplicationDestination {
                name: managed_environment_id.to_string(),
                namespace: destination_namespace,
            },
            automated_sync: deployment.spec.spec_type == DEPLOYMENT_SPEC_TYPE_AUTOMATED,
        },
    };

    serde_json::to_string(&engine_application)
        .map_err(|e| ReconcileError::Severe(format!("unable to serialize engine spec: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use sindri_models::api::{ApplicationDestination, GitOpsDeploymentSpec};

    fn deployment_with_path(path: &str) -> GitOpsDeployment {
        GitOpsDeployment {
            metadata: ObjectMeta {
                name: Some("my-gitops-depl".into()),
                namespace: Some("jane".into()),
                uid: Some("uid-1".into()),
                ..Default::default()
            },
            spec: GitOpsDeploymentSpec {
                source: ApplicationSource {
                    repo_url: "https://github.com/test/test".into(),
                    path: path.into(),
                    target_revision: String::new(),
                },
                destination: ApplicationDestination::default(),
                spec_type: String::new(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_path_is_path_is_required() {
        let err = validate_deployment_spec(&deployment_with_path("")).unwrap_err();
        assert_eq!(err.user_error(), Some(&UserError::PathIsRequired));
    }

    #[test]
    fn test_slash_path_is_invalid_path_slash() {
        let err = validate_deployment_spec(&deployment_with_path("/")).unwrap_err();
        assert_eq!(err.user_error(), Some(&UserError::InvalidPathSlash));
    }

    #[test]
    fn test_valid_path_passes() {
        assert!(validate_deployment_spec(&deployment_with_path("environments/dev")).is_ok());
    }

    #[test]
    fn test_spec_field_is_deterministic() {
        let deployment = deployment_with_path("environments/dev");
        let instance = GitopsEngineInstance::new(
            "sindri-engine".into(),
            "engine-ns-uid".into(),
            "cluster-1".into(),
        );

        let a = build_engine_application_spec_field(&deployment, &instance, "env-1").unwrap();
        let b = build_engine_application_spec_field(&deployment, &instance, "env-1").unwrap();
        assert_eq!(a, b);

        let c = build_engine_application_spec_field(&deployment, &instance, "env-2").unwrap();
        assert_ne!(a, c);

        let parsed: EngineApplication = serde_json::from_str(&a).unwrap();
        assert_eq!(parsed.name, "gitopsdepl-uid-1");
        assert_eq!(parsed.spec.destination.namespace, "jane");
    }
}
