/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// The Operation resource created in the engine instance's namespace to wake
/// the cluster agent. The agent resolves `spec.operationID` against the
/// operations table for the actual work item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OperationResource {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: OperationResourceSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationResourceSpec {
    #[serde(default, rename = "operationID")]
    pub operation_id: String,
}

impl OperationResource {
    /// Conventional name for the Operation resource of a database operation row.
    pub fn name_for_operation_id(operation_id: &str) -> String {
        format!("operation-{}", operation_id)
    }
}
