/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Sindri-Models
//!
//! Row types and schema for the Sindri database of record, plus the API
//! resource types (GitOpsDeployment and siblings) that the backend reconciles
//! against those rows.

/// Data structures representing database tables.
pub mod models;

/// Database schema definitions.
pub mod schema;

/// API custom resource types and admission validation.
pub mod api;
