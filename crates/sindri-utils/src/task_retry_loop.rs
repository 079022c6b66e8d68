/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Task Retry Loop
//!
//! A keyed task executor: at most one task runs per key at any instant, and
//! failed tasks are retried with per-key exponential backoff.
//!
//! Adding a task for a key that is already queued or running is coalesced:
//! while a task for the key is executing, the first re-add is remembered and
//! run once the current attempt settles; further re-adds are dropped. A key
//! whose task reports success has its backoff reset to the minimum.
//!
//! Dropping the [`TaskRetryLoop`] stops dispatch; in-flight tasks run to
//! completion and are then discarded.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::backoff::ExponentialBackoff;

/// Error type reported by tasks; only used for logging at the loop boundary.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// A unit of work that can be re-run.
#[async_trait]
pub trait RetryableTask: Send + 'static {
    /// Performs the work. Returns `true` if the task should be retried
    /// (after backoff), plus an optional error to log. Tasks that observe
    /// cancellation should return `(false, ...)` so the key is dropped.
    async fn perform_task(&mut self) -> (bool, Option<TaskError>);
}

/// Handle to a running retry loop. Cloneable; the loop itself exits once all
/// handles are dropped and in-flight tasks have settled.
#[derive(Clone)]
pub struct TaskRetryLoop {
    name: String,
    sender: mpsc::UnboundedSender<TaskRetryLoopMessage>,
}

impl fmt::Debug for TaskRetryLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRetryLoop")
            .field("name", &self.name)
            .finish()
    }
}

enum TaskRetryLoopMessage {
    AddTaskIfNotPresent {
        key: String,
        task: Box<dyn RetryableTask>,
        backoff: ExponentialBackoff,
    },
    TaskCompleted {
        key: String,
        task: Box<dyn RetryableTask>,
        retry: bool,
    },
    RetryExpired {
        key: String,
    },
}

enum KeyState {
    /// A worker is executing the task. `pending` holds the coalesced re-add.
    Running {
        backoff: ExponentialBackoff,
        pending: Option<Box<dyn RetryableTask>>,
    },
    /// The task failed and is waiting out its backoff delay.
    WaitingForBackoff {
        backoff: ExponentialBackoff,
        task: Box<dyn RetryableTask>,
        pending_requested: bool,
    },
}

impl TaskRetryLoop {
    /// Spawns a new retry loop with the given name (used in log output).
    pub fn new(name: &str) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        let loop_name = name.to_string();
        tokio::spawn(internal_task_retry_loop(loop_name.clone(), receiver, sender.clone()));

        TaskRetryLoop {
            name: name.to_string(),
            sender,
        }
    }

    /// Enqueues `task` under `key` unless a task for that key is already
    /// queued or running (in which case the add is coalesced or dropped).
    pub fn add_task_if_not_present(
        &self,
        key: &str,
        task: Box<dyn RetryableTask>,
        backoff: ExponentialBackoff,
    ) {
        // Send only fails after shutdown, when dropping the task is correct.
        let _ = self
            .sender
            .send(TaskRetryLoopMessage::AddTaskIfNotPresent {
                key: key.to_string(),
                task,
                backoff,
            });
    }
}

async fn internal_task_retry_loop(
    name: String,
    mut receiver: mpsc::UnboundedReceiver<TaskRetryLoopMessage>,
    sender: mpsc::UnboundedSender<TaskRetryLoopMessage>,
) {
    let mut keys: HashMap<String, KeyState> = HashMap::new();

    while let Some(msg) = receiver.recv().await {
        match msg {
            TaskRetryLoopMessage::AddTaskIfNotPresent { key, task, backoff } => {
                match keys.get_mut(&key) {
                    None => {
                        debug!(task_loop = %name, %key, "starting task");
                        keys.insert(
                            key.clone(),
                            KeyState::Running {
                                backoff,
                                pending: None,
                            },
                        );
                        start_worker(&sender, key, task);
                    }
                    Some(KeyState::Running { pending, .. }) => {
                        // Coalesce: remember at most one follow-up attempt.
                        if pending.is_none() {
                            debug!(task_loop = %name, %key, "coalescing re-added task");
                            *pending = Some(task);
                        }
                    }
                    Some(KeyState::WaitingForBackoff {
                        pending_requested, ..
                    }) => {
                        // The queued retry already covers this work.
                        *pending_requested = true;
                    }
                }
            }

            TaskRetryLoopMessage::TaskCompleted { key, task, retry } => {
                let Some(state) = keys.remove(&key) else {
                    error!(task_loop = %name, %key, "SEVERE: completion for unknown key");
                    continue;
                };
                let KeyState::Running {
                    mut backoff,
                    pending,
                } = state
                else {
                    error!(task_loop = %name, %key, "SEVERE: completion for key that is not running");
                    continue;
                };

                if retry {
                    let delay = backoff.increase_and_return_new_duration();
                    debug!(task_loop = %name, %key, ?delay, "task will retry after backoff");
                    keys.insert(
                        key.clone(),
                        KeyState::WaitingForBackoff {
                            backoff,
                            task,
                            pending_requested: pending.is_some(),
                        },
                    );
                    let timer_sender = sender.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = timer_sender.send(TaskRetryLoopMessage::RetryExpired { key });
                    });
                } else {
                    backoff.reset();
                    if let Some(next) = pending {
                        debug!(task_loop = %name, %key, "starting coalesced follow-up task");
                        keys.insert(
                            key.clone(),
                            KeyState::Running {
                                backoff,
                                pending: None,
                            },
                        );
                        start_worker(&sender, key, next);
                    }
                }
            }

            TaskRetryLoopMessage::RetryExpired { key } => {
                let Some(state) = keys.remove(&key) else {
                    // Key settled while the timer was in flight.
                    continue;
                };
                match state {
                    KeyState::WaitingForBackoff { backoff, task, .. } => {
                        debug!(task_loop = %name, %key, "retrying task");
                        keys.insert(
                            key.clone(),
                            KeyState::Running {
                                backoff,
                                pending: None,
                            },
                        );
                        start_worker(&sender, key, task);
                    }
                    running => {
                        // Stale timer; put the state back untouched.
                        keys.insert(key, running);
                    }
                }
            }
        }
    }

    warn!(task_loop = %name, "task retry loop shutting down");
}

fn start_worker(
    sender: &mpsc::UnboundedSender<TaskRetryLoopMessage>,
    key: String,
    mut task: Box<dyn RetryableTask>,
) {
    let sender = sender.clone();
    tokio::spawn(async move {
        let (retry, err) = task.perform_task().await;
        if let Some(err) = err {
            error!(%key, %retry, "task reported error: {}", err);
        }
        let _ = sender.send(TaskRetryLoopMessage::TaskCompleted { key, task, retry });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_backoff() -> ExponentialBackoff {
        ExponentialBackoff::new(
            2.0,
            Duration::from_millis(5),
            Duration::from_millis(50),
            false,
        )
    }

    /// Counts executions; fails (with retry) until `fail_count` runs happened.
    struct CountingTask {
        runs: Arc<AtomicUsize>,
        fail_count: usize,
        duration: Duration,
    }

    #[async_trait]
    impl RetryableTask for CountingTask {
        async fn perform_task(&mut self) -> (bool, Option<TaskError>) {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.duration).await;
            if run < self.fail_count {
                (true, Some("transient failure".into()))
            } else {
                (false, None)
            }
        }
    }

    /// Tracks how many instances run concurrently.
    struct ConcurrencyTask {
        active: Arc<AtomicUsize>,
        max_seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RetryableTask for ConcurrencyTask {
        async fn perform_task(&mut self) -> (bool, Option<TaskError>) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            (false, None)
        }
    }

    #[tokio::test]
    async fn test_runs_a_task_once() {
        let retry_loop = TaskRetryLoop::new("test");
        let runs = Arc::new(AtomicUsize::new(0));

        retry_loop.add_task_if_not_present(
            "key-a",
            Box::new(CountingTask {
                runs: runs.clone(),
                fail_count: 0,
                duration: Duration::ZERO,
            }),
            fast_backoff(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let retry_loop = TaskRetryLoop::new("test");
        let runs = Arc::new(AtomicUsize::new(0));

        retry_loop.add_task_if_not_present(
            "key-a",
            Box::new(CountingTask {
                runs: runs.clone(),
                fail_count: 3,
                duration: Duration::ZERO,
            }),
            fast_backoff(),
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_at_most_one_running_per_key() {
        let retry_loop = TaskRetryLoop::new("test");
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            retry_loop.add_task_if_not_present(
                "key-a",
                Box::new(ConcurrencyTask {
                    active: active.clone(),
                    max_seen: max_seen.clone(),
                }),
                fast_backoff(),
            );
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_re_adds_coalesce_to_one_follow_up() {
        let retry_loop = TaskRetryLoop::new("test");
        let runs = Arc::new(AtomicUsize::new(0));

        let make_task = |runs: &Arc<AtomicUsize>| {
            Box::new(CountingTask {
                runs: runs.clone(),
                fail_count: 0,
                duration: Duration::from_millis(30),
            })
        };

        retry_loop.add_task_if_not_present("key-a", make_task(&runs), fast_backoff());
        // Re-add several times while the first attempt is still sleeping.
        tokio::time::sleep(Duration::from_millis(5)).await;
        for _ in 0..4 {
            retry_loop.add_task_if_not_present("key-a", make_task(&runs), fast_backoff());
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_different_keys_run_concurrently() {
        let retry_loop = TaskRetryLoop::new("test");
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for key in ["key-a", "key-b", "key-c"] {
            retry_loop.add_task_if_not_present(
                key,
                Box::new(ConcurrencyTask {
                    active: active.clone(),
                    max_seen: max_seen.clone(),
                }),
                fast_backoff(),
            );
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(max_seen.load(Ordering::SeqCst) > 1);
    }
}
