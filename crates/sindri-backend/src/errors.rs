/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Error Taxonomy
//!
//! Reconciliation distinguishes two families of failure:
//!
//! - **User errors** are caller-correctable: the user must change their
//!   resource before reconciliation can make progress. They surface as an
//!   `ErrorOccurred` condition on the resource and are never retried.
//! - **System errors** are transient infrastructure failures (database,
//!   API server) and are retried by the task retry loop with exponential
//!   backoff.
//!
//! Only retry-loop boundaries inspect this distinction; everything below them
//! simply propagates `ReconcileError` with `?`.

use crate::cluster::ClusterError;
use crate::dal::DatabaseError;

/// Errors the user must resolve by correcting their resources.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserError {
    #[error("gitops deployment source path is required")]
    PathIsRequired,

    #[error("gitops deployment source path cannot be '/'")]
    InvalidPathSlash,

    #[error("sync run name is longer than the maximum object name length")]
    SyncRunNameTooLong,

    #[error("sync run references a gitops deployment that does not exist: {0}")]
    SyncRunMissingDeployment(String),

    #[error("managed environment '{0}' does not exist in the namespace")]
    ManagedEnvironmentMissing(String),

    #[error("managed environment credentials are invalid: {0}")]
    InvalidManagedEnvironmentCredentials(String),

    #[error("repository credential secret '{0}' does not exist")]
    RepositoryCredentialSecretMissing(String),
}

/// Error type flowing through the reconciliation call chain.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Corrupt payloads, unexpected states. Logged as SEVERE and not retried.
    #[error("severe: {0}")]
    Severe(String),
}

impl ReconcileError {
    /// True when the failure is caller-correctable and must not be retried.
    pub fn is_user_error(&self) -> bool {
        matches!(self, ReconcileError::User(_))
    }

    /// True when the retry loop should re-run the task with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::User(_) | ReconcileError::Severe(_) => false,
            ReconcileError::Database(_) => true,
            ReconcileError::Cluster(e) => e.is_retryable(),
        }
    }

    pub fn user_error(&self) -> Option<&UserError> {
        match self {
            ReconcileError::User(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_are_not_retryable() {
        let err = ReconcileError::User(UserError::PathIsRequired);
        assert!(err.is_user_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_severe_errors_are_not_retryable() {
        let err = ReconcileError::Severe("unexpected payload".into());
        assert!(!err.is_user_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_database_errors_are_retryable() {
        let err = ReconcileError::Database(DatabaseError::Pool("pool exhausted".into()));
        assert!(err.is_retryable());
    }
}
