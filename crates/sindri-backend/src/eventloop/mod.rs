/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Event Loop Hierarchy
//!
//! Reconcile requests flow through a tree of long-lived serial lanes, each a
//! spawned task owning one input channel:
//!
//! ```text
//! preprocess -> workspace (per namespace) -> application (per deployment)
//!                        \-> workspace resource (per namespace)
//! both -----------------------------------> shared resource loop -> database
//! ```
//!
//! Within a lane messages are processed strictly in arrival order; work that
//! crosses lanes is a message send, with replies on dedicated oneshot
//! channels. Cross-resource invalidations (a shared managed environment
//! changed) are injected back at the workspace layer and fanned out to the
//! deployment lanes that reference the resource.

pub mod application_event_loop;
pub mod application_event_runner;
pub mod application_event_runner_status;
pub mod application_event_runner_syncruns;
pub mod application_state_cache;
pub mod preprocess_event_loop;
pub mod shared_resource_loop;
pub mod types;
pub mod workspace_event_loop;
pub mod workspace_resource_event_loop;
