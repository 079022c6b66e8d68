/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Application State Cache
//!
//! A single-owner actor over the ApplicationState rows: one task owns the
//! map, callers go through request/reply channels, and nobody mutates the
//! cache directly. The cache is write-through and read-through; the database
//! stays authoritative.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

use sindri_models::models::ApplicationState;

use crate::dal::{DatabaseError, DatabaseQueries};

#[derive(Clone)]
pub struct ApplicationStateCache {
    sender: mpsc::UnboundedSender<ApplicationStateCacheRequest>,
}

enum ApplicationStateCacheRequest {
    Get {
        application_id: String,
        reply: oneshot::Sender<Result<Option<ApplicationState>, DatabaseError>>,
    },
    Create {
        state: ApplicationState,
        reply: oneshot::Sender<Result<(), DatabaseError>>,
    },
    Update {
        state: ApplicationState,
        reply: oneshot::Sender<Result<(), DatabaseError>>,
    },
    Delete {
        application_id: String,
        reply: oneshot::Sender<Result<usize, DatabaseError>>,
    },
}

impl ApplicationStateCache {
    pub fn new(db: Arc<dyn DatabaseQueries>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(application_state_cache_loop(receiver, db));
        ApplicationStateCache { sender }
    }

    pub async fn get_application_state_by_id(
        &self,
        application_id: &str,
    ) -> Result<Option<ApplicationState>, DatabaseError> {
        let (reply, rx) = oneshot::channel();
        self.send(ApplicationStateCacheRequest::Get {
            application_id: application_id.to_string(),
            reply,
        })?;
        await_reply(rx).await
    }

    pub async fn create_application_state(
        &self,
        state: ApplicationState,
    ) -> Result<(), DatabaseError> {
        let (reply, rx) = oneshot::channel();
        self.send(ApplicationStateCacheRequest::Create { state, reply })?;
        await_reply(rx).await
    }

    pub async fn update_application_state(
        &self,
        state: ApplicationState,
    ) -> Result<(), DatabaseError> {
        let (reply, rx) = oneshot::channel();
        self.send(ApplicationStateCacheRequest::Update { state, reply })?;
        await_reply(rx).await
    }

    /// Returns the number of rows deleted.
    pub async fn delete_application_state_by_id(
        &self,
        application_id: &str,
    ) -> Result<usize, DatabaseError> {
        let (reply, rx) = oneshot::channel();
        self.send(ApplicationStateCacheRequest::Delete {
            application_id: application_id.to_string(),
            reply,
        })?;
        await_reply(rx).await
    }

    fn send(&self, request: ApplicationStateCacheRequest) -> Result<(), DatabaseError> {
        self.sender
            .send(request)
            .map_err(|_| DatabaseError::Pool("application state cache is not running".into()))
    }
}

async fn await_reply<T>(
    rx: oneshot::Receiver<Result<T, DatabaseError>>,
) -> Result<T, DatabaseError> {
    rx.await
        .map_err(|_| DatabaseError::Pool("application state cache dropped a request".into()))?
}

async fn application_state_cache_loop(
    mut receiver: mpsc::UnboundedReceiver<ApplicationStateCacheRequest>,
    db: Arc<dyn DatabaseQueries>,
) {
    let mut cache: HashMap<String, ApplicationState> = HashMap::new();

    while let Some(request) = receiver.recv().await {
        match request {
            ApplicationStateCacheRequest::Get {
                application_id,
                reply,
            } => {
                if application_id.is_empty() {
                    error!("SEVERE: application state cache get with empty key");
                    let _ = reply.send(Ok(None));
                    continue;
                }

                if let Some(cached) = cache.get(&application_id) {
                    let _ = reply.send(Ok(Some(cached.clone())));
                    continue;
                }

                let result = db.get_application_state_by_id(&application_id);
                if let Ok(Some(state)) = &result {
                    cache.insert(application_id, state.clone());
                }
                let _ = reply.send(result);
            }

            ApplicationStateCacheRequest::Create { state, reply } => {
                let result = db.create_application_state(&state);
                if result.is_ok() {
                    cache.insert(state.applicationstate_application_id.clone(), state);
                }
                let _ = reply.send(result);
            }

            ApplicationStateCacheRequest::Update { state, reply } => {
                let result = db.update_application_state(&state).map(|rows| {
                    if rows == 0 {
                        warn!(
                            application_id = %state.applicationstate_application_id,
                            "update of application state matched no rows"
                        );
                    }
                });
                if result.is_ok() {
                    cache.insert(state.applicationstate_application_id.clone(), state);
                }
                let _ = reply.send(result);
            }

            ApplicationStateCacheRequest::Delete {
                application_id,
                reply,
            } => {
                cache.remove(&application_id);
                let _ = reply.send(db.delete_application_state_by_id(&application_id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dal::in_memory::InMemoryDatabase;

    fn sample_state(id: &str, health: &str) -> ApplicationState {
        ApplicationState {
            applicationstate_application_id: id.to_string(),
            health: health.to_string(),
            sync_status: "Synced".to_string(),
            revision: "abcdefg".to_string(),
            message: "Success".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips() {
        let db: Arc<dyn DatabaseQueries> = Arc::new(InMemoryDatabase::new());
        let cache = ApplicationStateCache::new(db.clone());

        cache
            .create_application_state(sample_state("app-1", "Healthy"))
            .await
            .unwrap();

        let fetched = cache
            .get_application_state_by_id("app-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.health, "Healthy");

        // The row is authoritative in the database too, not just the cache.
        assert!(db.get_application_state_by_id("app-1").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_fetches_from_database_on_miss() {
        let db: Arc<dyn DatabaseQueries> = Arc::new(InMemoryDatabase::new());
        db.create_application_state(&sample_state("app-1", "Progressing"))
            .unwrap();

        let cache = ApplicationStateCache::new(db.clone());
        let fetched = cache
            .get_application_state_by_id("app-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.health, "Progressing");
    }

    #[tokio::test]
    async fn test_update_writes_through() {
        let db: Arc<dyn DatabaseQueries> = Arc::new(InMemoryDatabase::new());
        let cache = ApplicationStateCache::new(db.clone());

        cache
            .create_application_state(sample_state("app-1", "Progressing"))
            .await
            .unwrap();
        cache
            .update_application_state(sample_state("app-1", "Healthy"))
            .await
            .unwrap();

        let cached = cache
            .get_application_state_by_id("app-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.health, "Healthy");
        assert_eq!(
            db.get_application_state_by_id("app-1").unwrap().unwrap().health,
            "Healthy"
        );
    }

    #[tokio::test]
    async fn test_delete_reports_rows_affected() {
        let db: Arc<dyn DatabaseQueries> = Arc::new(InMemoryDatabase::new());
        let cache = ApplicationStateCache::new(db.clone());

        cache
            .create_application_state(sample_state("app-1", "Healthy"))
            .await
            .unwrap();

        assert_eq!(cache.delete_application_state_by_id("app-1").await.unwrap(), 1);
        assert_eq!(cache.delete_application_state_by_id("app-1").await.unwrap(), 0);
        assert!(cache
            .get_application_state_by_id("app-1")
            .await
            .unwrap()
            .is_none());
    }
}
