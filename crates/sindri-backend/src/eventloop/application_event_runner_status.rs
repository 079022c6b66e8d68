/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Application Event Runner: status tick
//!
//! On a timer, each deployment lane mirrors the latest ApplicationState row
//! onto the resource's `.status`. The write is diffed: a tick with no
//! intervening state change issues no API call and reports `updated = false`.

use serde::Deserialize;
use sindri_utils::compression::decompress_object;
use tracing::info;

use sindri_models::api::{
    conditions, HealthStatus, ReconciledState, ResourceStatus, SyncStatus,
    CONDITION_ERROR_OCCURRED, CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE,
};
use sindri_models::models::mappings::DB_RELATION_TYPE_MANAGED_ENVIRONMENT;

use crate::errors::ReconcileError;

use super::application_event_runner::ApplicationEventRunner;

/// Condition entry as the engine reports it: a YAML sequence of
/// `{type, message, status?}` in the `conditions` column.
#[derive(Debug, Clone, Deserialize)]
struct EngineApplicationCondition {
    #[serde(rename = "type")]
    condition_type: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl ApplicationEventRunner {
    /// Mirrors ApplicationState onto the deployment's status subresource.
    /// Returns whether a write was issued.
    pub async fn handle_update_deployment_status_tick(
        &self,
        deployment_name: &str,
        deployment_namespace: &str,
    ) -> Result<bool, ReconcileError> {
        let Some(mapping) = self
            .db
            .list_deployment_to_application_mappings_by_namespace_and_name(
                deployment_name,
                deployment_namespace,
                &self.workspace_id,
            )?
            .into_iter()
            .next()
        else {
            return Ok(false);
        };

        let Some(application_state) = self
            .db
            .get_application_state_by_id(&mapping.application_id)?
        else {
            return Ok(false);
        };

        let Some(mut deployment) = self
            .workspace_client
            .get_gitops_deployment(deployment_namespace, deployment_name)
            .await?
        else {
            return Ok(false);
        };

        let mut status = deployment.status.clone();

        status.health = HealthStatus {
            status: application_state.health.clone(),
            message: application_state.message.clone(),
        };
        status.sync = SyncStatus {
            status: application_state.sync_status.clone(),
            revision: application_state.revision.clone(),
        };

        let resources_bytes = application_state.resources.as_deref().unwrap_or_default();
        status.resources = decompress_object::<Vec<ResourceStatus>>(resources_bytes)
            .map_err(|e| {
                ReconcileError::Severe(format!("corrupt resources payload: {}", e))
            })?
            .unwrap_or_default();

        let operation_state_bytes = application_state
            .operation_state
            .as_deref()
            .unwrap_or_default();
        status.operation_state = decompress_object::<serde_json::Value>(operation_state_bytes)
            .map_err(|e| {
                ReconcileError::Severe(format!("corrupt operation state payload: {}", e))
            })?;

        status.reconciled_state = self.resolve_reconciled_state(&application_state.reconciled_state)?;

        let engine_conditions = parse_engine_conditions(application_state.conditions.as_deref())?;
        merge_engine_conditions(&mut status.conditions, &engine_conditions);

        if status == deployment.status {
            return Ok(false);
        }

        deployment.status = status;
        self.workspace_client
            .update_gitops_deployment_status(&deployment)
            .await?;

        info!(
            deployment = %deployment_name,
            health = %application_state.health,
            sync_status = %application_state.sync_status,
            "updated deployment status from application state"
        );
        Ok(true)
    }

    /// Parses the reconciled-state column and swaps the destination name
    /// (a ManagedEnvironment row id on the wire) for the resource name the
    /// user knows. A missing mapping leaves the name blank.
    fn resolve_reconciled_state(
        &self,
        reconciled_state_json: &str,
    ) -> Result<ReconciledState, ReconcileError> {
        if reconciled_state_json.is_empty() {
            return Ok(ReconciledState::default());
        }

        let mut reconciled: ReconciledState = serde_json::from_str(reconciled_state_json)
            .map_err(|e| ReconcileError::Severe(format!("corrupt reconciled state: {}", e)))?;

        if !reconciled.destination.name.is_empty() {
            reconciled.destination.name = self
                .db
                .get_api_cr_to_database_mapping_for_database_id(
                    DB_RELATION_TYPE_MANAGED_ENVIRONMENT,
                    &reconciled.destination.name,
                )?
                .map(|m| m.api_resource_name)
                .unwrap_or_default();
        }

        Ok(reconciled)
    }
}

fn parse_engine_conditions(
    raw: Option<&[u8]>,
) -> Result<Vec<EngineApplicationCondition>, ReconcileError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_slice(raw)
        .map_err(|e| ReconcileError::Severe(format!("corrupt conditions payload: {}", e)))
}

/// Folds the engine's conditions into the resource condition list. Entries
/// already in the desired state are left untouched so their timestamps (and
/// therefore the whole status) stay stable across no-op ticks. Conditions the
/// engine no longer reports transition to False with an empty message; the
/// reconciler-owned `ErrorOccurred` condition is never touched here.
fn merge_engine_conditions(
    existing: &mut Vec<sindri_models::api::GitOpsDeploymentCondition>,
    engine_conditions: &[EngineApplicationCondition],
) {
    for engine_condition in engine_conditions {
        let desired_status = engine_condition
            .status
            .clone()
            .unwrap_or_else(|| CONDITION_STATUS_TRUE.to_string());

        let unchanged = conditions::find_condition(existing, &engine_condition.condition_type)
            .is_some_and(|c| c.status == desired_status && c.message == engine_condition.message);
        if unchanged {
            continue;
        }

        conditions::set_condition(
            existing,
            &engine_condition.condition_type,
            &desired_status,
            "",
            &engine_condition.message,
        );
    }

    let reported: Vec<String> = engine_conditions
        .iter()
        .map(|c| c.condition_type.clone())
        .collect();

    let stale: Vec<String> = existing
        .iter()
        .filter(|c| {
            c.condition_type != CONDITION_ERROR_OCCURRED
                && !reported.contains(&c.condition_type)
                && !(c.status == CONDITION_STATUS_FALSE && c.message.is_empty())
        })
        .map(|c| c.condition_type.clone())
        .collect();

    for condition_type in stale {
        conditions::set_condition(existing, &condition_type, CONDITION_STATUS_FALSE, "", "");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_sets_new_conditions_true_by_default() {
        let mut existing = Vec::new();
        let engine = vec![EngineApplicationCondition {
            condition_type: "ComparisonError".into(),
            message: "comparision error".into(),
            status: None,
        }];

        merge_engine_conditions(&mut existing, &engine);
        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].status, CONDITION_STATUS_TRUE);
        assert_eq!(existing[0].message, "comparision error");
    }

    #[test]
    fn test_merge_is_stable_when_nothing_changed() {
        let mut existing = Vec::new();
        let engine = vec![EngineApplicationCondition {
            condition_type: "SharedResourceWarning".into(),
            message: "shared resource warning".into(),
            status: None,
        }];

        merge_engine_conditions(&mut existing, &engine);
        let snapshot = existing.clone();
        merge_engine_conditions(&mut existing, &engine);
        assert_eq!(existing, snapshot);
    }

    #[test]
    fn test_merge_flips_unreported_conditions_to_false() {
        let mut existing = Vec::new();
        let engine = vec![EngineApplicationCondition {
            condition_type: "ComparisonError".into(),
            message: "comparision error".into(),
            status: None,
        }];
        merge_engine_conditions(&mut existing, &engine);

        merge_engine_conditions(&mut existing, &[]);
        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].status, CONDITION_STATUS_FALSE);
        assert_eq!(existing[0].message, "");

        // And stays stable once flipped.
        let snapshot = existing.clone();
        merge_engine_conditions(&mut existing, &[]);
        assert_eq!(existing, snapshot);
    }

    #[test]
    fn test_merge_never_touches_error_occurred() {
        let mut existing = Vec::new();
        conditions::set_condition(
            &mut existing,
            CONDITION_ERROR_OCCURRED,
            CONDITION_STATUS_TRUE,
            "ReconcileError",
            "gitops deployment path field is empty",
        );
        let snapshot = existing.clone();

        merge_engine_conditions(&mut existing, &[]);
        assert_eq!(existing, snapshot);
    }

    #[test]
    fn test_parse_engine_conditions_yaml() {
        let yaml = b"- type: ComparisonError\n  message: comparision error\n- type: SharedResourceWarning\n  message: shared resource warning\n";
        let parsed = parse_engine_conditions(Some(yaml)).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].condition_type, "ComparisonError");
        assert_eq!(parsed[1].message, "shared resource warning");
    }

    #[test]
    fn test_parse_engine_conditions_empty() {
        assert!(parse_engine_conditions(None).unwrap().is_empty());
        assert!(parse_engine_conditions(Some(b"")).unwrap().is_empty());
    }
}
