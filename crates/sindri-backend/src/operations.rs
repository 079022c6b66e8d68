/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Operation lifecycle helpers.
//!
//! Every database mutation the cluster agent must act on is paired with an
//! Operation row, plus an Operation resource in the engine instance's
//! namespace to wake the agent. Row and resource are created together here so
//! reconcilers cannot forget one half.

use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::info;

use sindri_models::api::OperationResource;
use sindri_models::api::OperationResourceSpec;
use sindri_models::models::Operation;

use crate::cluster::WorkspaceClient;
use crate::dal::DatabaseQueries;
use crate::errors::ReconcileError;

/// Creates the Operation row and the corresponding Operation resource in the
/// engine instance's namespace.
pub async fn create_operation(
    db: &Arc<dyn DatabaseQueries>,
    client: &Arc<dyn WorkspaceClient>,
    operation: Operation,
) -> Result<Operation, ReconcileError> {
    db.create_operation(&operation)?;

    let engine_namespace = match db.get_gitops_engine_instance_by_id(&operation.instance_id)? {
        Some(instance) => instance.namespace_name,
        None => {
            return Err(ReconcileError::Severe(format!(
                "operation {} references unknown engine instance {}",
                operation.operation_id, operation.instance_id
            )))
        }
    };

    let resource = OperationResource {
        metadata: ObjectMeta {
            name: Some(OperationResource::name_for_operation_id(
                &operation.operation_id,
            )),
            namespace: Some(engine_namespace.clone()),
            ..Default::default()
        },
        spec: OperationResourceSpec {
            operation_id: operation.operation_id.clone(),
        },
    };

    client
        .create_operation_resource(&engine_namespace, &resource)
        .await?;

    info!(
        operation_id = %operation.operation_id,
        resource_type = %operation.resource_type,
        resource_id = %operation.resource_id,
        "created operation"
    );

    Ok(operation)
}

/// Deletes the Operation resource, then the row. Safe to call when either
/// half is already gone.
pub async fn cleanup_operation(
    db: &Arc<dyn DatabaseQueries>,
    client: &Arc<dyn WorkspaceClient>,
    operation: &Operation,
) -> Result<(), ReconcileError> {
    if let Some(instance) = db.get_gitops_engine_instance_by_id(&operation.instance_id)? {
        client
            .delete_operation_resource(
                &instance.namespace_name,
                &OperationResource::name_for_operation_id(&operation.operation_id),
            )
            .await?;
    }

    db.delete_operation_by_id(&operation.operation_id)?;
    Ok(())
}
