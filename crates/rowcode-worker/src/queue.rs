//! Work queue: bounded concurrency, dispatch rate limit, timeout and retry.
//!
//! Tasks wait in a FIFO queue and are dispatched while two gates are open: fewer than
//! `capacity` tasks are running, and at least `dispatch_interval` has passed since the
//! previous dispatch. When only the rate gate is closed a single timer is armed for the
//! exact moment it reopens.
//!
//! A dispatched task keeps its slot until it settles. Transient failures are retried
//! inside that slot after an exponential backoff, so retries neither re-enter the FIFO
//! queue nor count against the dispatch rate.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::time::{sleep, Instant};

use rowcode_core::constants::{
    DEFAULT_CONCURRENCY, DEFAULT_DISPATCH_INTERVAL_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_TASK_TIMEOUT_SECS, MAX_RETRY_BACKOFF_MS, RETRY_BACKOFF_BASE_MS,
};
use rowcode_core::{Config, TaskError};

use crate::task::{QueueTask, TaskHandle};

/// Computes the wait before retry number `attempt + 1` (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff(attempt: u32) -> Duration {
    let factor = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(
        factor
            .saturating_mul(RETRY_BACKOFF_BASE_MS)
            .min(MAX_RETRY_BACKOFF_MS),
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkQueueConfig {
    /// Maximum number of tasks running at once.
    pub capacity: usize,
    /// Minimum gap between two dispatches.
    pub dispatch_interval: Duration,
    /// Default retry budget for tasks that do not set their own.
    pub max_retries: u32,
    /// Bound on a single attempt.
    pub task_timeout: Duration,
}

impl Default for WorkQueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CONCURRENCY,
            dispatch_interval: Duration::from_millis(DEFAULT_DISPATCH_INTERVAL_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            task_timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS),
        }
    }
}

impl From<&Config> for WorkQueueConfig {
    fn from(config: &Config) -> Self {
        Self {
            capacity: config.concurrency,
            dispatch_interval: config.dispatch_interval(),
            max_retries: config.max_retries,
            task_timeout: config.task_timeout(),
        }
    }
}

/// Point-in-time snapshot of the queue. For observability only.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct QueueStatus {
    pub queued: usize,
    pub running: usize,
    pub capacity: usize,
    pub interval_ms: u64,
}

struct Pending<T> {
    task: QueueTask<T>,
    responder: oneshot::Sender<Result<T, TaskError>>,
    enqueued_at: Instant,
}

struct QueueState<T> {
    pending: VecDeque<Pending<T>>,
    running: usize,
    last_dispatch: Option<Instant>,
    wakeup_armed: bool,
}

struct Shared<T> {
    config: WorkQueueConfig,
    state: Mutex<QueueState<T>>,
    idle: Notify,
}

impl<T> Shared<T> {
    fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.pending.is_empty() && state.running == 0
    }
}

/// Occupied concurrency slot. Releasing it (also on panic) wakes the dispatcher.
struct Slot<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Drop for Slot<T> {
    fn drop(&mut self) {
        let idle = {
            let mut state = self.shared.state.lock();
            state.running -= 1;
            state.running == 0 && state.pending.is_empty()
        };
        if idle {
            self.shared.idle.notify_waiters();
        }
        WorkQueue::<T>::dispatch(&self.shared);
    }
}

/// Rate-limited, retrying queue of asynchronous tasks.
///
/// Cloning yields another handle to the same queue. Must be used from within a tokio
/// runtime.
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send + 'static> WorkQueue<T> {
    pub fn new(config: WorkQueueConfig) -> Self {
        let config = WorkQueueConfig {
            capacity: config.capacity.max(1),
            ..config
        };

        tracing::info!(
            capacity = config.capacity,
            interval_ms = config.dispatch_interval.as_millis() as u64,
            max_retries = config.max_retries,
            timeout_ms = config.task_timeout.as_millis() as u64,
            "Work queue created"
        );

        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    running: 0,
                    last_dispatch: None,
                    wakeup_armed: false,
                }),
                idle: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &WorkQueueConfig {
        &self.shared.config
    }

    /// Enqueue a task and return a handle resolving to its final result.
    ///
    /// Returns immediately; the handle resolves once the task succeeds, fails fatally,
    /// exhausts its retries, or is rejected by [`cancel_all`](Self::cancel_all).
    pub fn submit(&self, task: QueueTask<T>) -> TaskHandle<T> {
        let (responder, receiver) = oneshot::channel();
        let id = task.id().to_string();

        {
            let mut state = self.shared.state.lock();
            state.pending.push_back(Pending {
                task,
                responder,
                enqueued_at: Instant::now(),
            });
            tracing::trace!(task_id = %id, queued = state.pending.len(), "Task enqueued");
        }

        Self::dispatch(&self.shared);
        TaskHandle::new(id, receiver)
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.shared.state.lock();
        QueueStatus {
            queued: state.pending.len(),
            running: state.running,
            capacity: self.shared.config.capacity,
            interval_ms: self.shared.config.dispatch_interval.as_millis() as u64,
        }
    }

    /// Resolves once nothing is queued and nothing is running.
    pub async fn drain(&self) {
        loop {
            // Registered before the check so a release in between is not missed.
            let notified = self.shared.idle.notified();
            if self.shared.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Reject every task that has not started yet. Running tasks are left alone.
    ///
    /// Returns the number of rejected tasks.
    pub fn cancel_all(&self) -> usize {
        let (cancelled, idle) = {
            let mut state = self.shared.state.lock();
            let cancelled: Vec<Pending<T>> = state.pending.drain(..).collect();
            (cancelled, state.running == 0)
        };

        let count = cancelled.len();
        for pending in cancelled {
            let _ = pending.responder.send(Err(TaskError::cancelled()));
        }
        if idle {
            self.shared.idle.notify_waiters();
        }

        tracing::info!(cancelled = count, "Queued tasks cancelled");
        count
    }

    /// Start as many queued tasks as both gates allow.
    fn dispatch(shared: &Arc<Shared<T>>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime available, dispatch skipped");
            return;
        };

        let interval = shared.config.dispatch_interval;
        let mut ready = Vec::new();
        let mut wakeup = None;

        {
            let mut state = shared.state.lock();
            while !state.pending.is_empty() && state.running < shared.config.capacity {
                let now = Instant::now();
                if let Some(last) = state.last_dispatch {
                    let elapsed = now.saturating_duration_since(last);
                    if elapsed < interval {
                        if !state.wakeup_armed {
                            state.wakeup_armed = true;
                            wakeup = Some(interval - elapsed);
                        }
                        break;
                    }
                }

                let Some(next) = state.pending.pop_front() else {
                    break;
                };
                state.running += 1;
                state.last_dispatch = Some(now);
                ready.push(next);
            }
        }

        // Spawned outside the lock: a future dropped by a closing runtime releases its
        // slot, which takes the lock again.
        for next in ready {
            let slot = Slot {
                shared: shared.clone(),
            };
            runtime.spawn(Self::execute(slot, next, shared.config.clone()));
        }

        if let Some(wait) = wakeup {
            let shared = shared.clone();
            runtime.spawn(async move {
                sleep(wait).await;
                shared.state.lock().wakeup_armed = false;
                Self::dispatch(&shared);
            });
        }
    }

    async fn execute(slot: Slot<T>, pending: Pending<T>, config: WorkQueueConfig) {
        let Pending {
            task,
            responder,
            enqueued_at,
        } = pending;
        let max_retries = task.max_retries().unwrap_or(config.max_retries);

        tracing::debug!(
            task_id = %task.id(),
            waited_ms = enqueued_at.elapsed().as_millis() as u64,
            "Task dispatched"
        );

        let mut attempt: u32 = 0;
        let result = loop {
            let outcome = match tokio::time::timeout(config.task_timeout, task.attempt()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(TaskError::timeout(config.task_timeout)),
            };

            match outcome {
                Ok(value) => {
                    tracing::debug!(task_id = %task.id(), attempt, "Task completed");
                    break Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let backoff = compute_retry_backoff(attempt);
                    tracing::warn!(
                        task_id = %task.id(),
                        error = %e,
                        kind = %e.kind(),
                        attempt = attempt + 1,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Task attempt failed, retrying"
                    );
                    // The slot stays occupied while backing off.
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(
                            task_id = %task.id(),
                            error = %e,
                            attempts = attempt + 1,
                            "Task failed after max retries"
                        );
                    } else {
                        tracing::warn!(
                            task_id = %task.id(),
                            error = %e,
                            kind = %e.kind(),
                            "Task failed with non-retryable error"
                        );
                    }
                    break Err(e);
                }
            }
        };

        let _ = responder.send(result);
        drop(slot);
    }
}
