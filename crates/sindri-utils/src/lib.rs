/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Sindri-Utils
//!
//! Shared utilities for the Sindri workspace: configuration loading,
//! telemetry initialization, exponential backoff, the keyed task retry loop,
//! and the gzip object codec shared with the cluster agent.

pub mod backoff;
pub mod compression;
pub mod config;
pub mod task_retry_loop;
pub mod telemetry;
