/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Status conditions on GitOpsDeployment resources, and the helpers the
//! event loops use to maintain them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Condition type set when reconciliation hits a user-correctable error.
pub const CONDITION_ERROR_OCCURRED: &str = "ErrorOccurred";

pub const CONDITION_REASON_RECONCILE_ERROR: &str = "ReconcileError";
pub const CONDITION_REASON_RECONCILE_ERROR_RESOLVED: &str = "ReconcileErrorResolved";

pub const CONDITION_STATUS_TRUE: &str = "True";
pub const CONDITION_STATUS_FALSE: &str = "False";
pub const CONDITION_STATUS_UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsDeploymentCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    #[serde(default)]
    pub message: String,
    /// True, False, or Unknown.
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe_time: Option<DateTime<Utc>>,
    /// Last time the condition flipped status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

/// Returns the condition of the given type, if present.
pub fn find_condition<'a>(
    conditions: &'a [GitOpsDeploymentCondition],
    condition_type: &str,
) -> Option<&'a GitOpsDeploymentCondition> {
    conditions
        .iter()
        .find(|c| c.condition_type == condition_type)
}

/// Inserts or updates the condition of the given type.
///
/// `last_transition_time` is only bumped when the status actually changes;
/// `last_probe_time` is bumped on every call.
pub fn set_condition(
    conditions: &mut Vec<GitOpsDeploymentCondition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    let now = Utc::now();

    if let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.condition_type == condition_type)
    {
        if existing.status != status {
            existing.last_transition_time = Some(now);
        }
        existing.status = status.to_string();
        existing.reason = reason.to_string();
        existing.message = message.to_string();
        existing.last_probe_time = Some(now);
        return;
    }

    conditions.push(GitOpsDeploymentCondition {
        condition_type: condition_type.to_string(),
        message: message.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        last_probe_time: Some(now),
        last_transition_time: Some(now),
    });
}
