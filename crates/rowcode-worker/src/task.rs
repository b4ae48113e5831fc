//! Task descriptors and result handles
//!
//! A [`QueueTask`] is an opaque unit of asynchronous work: an id, a factory producing
//! one attempt's future, and an optional retry budget. The queue calls the factory once
//! per attempt, so every attempt starts from a fresh future.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use rowcode_core::TaskError;

type AttemptFn<T> = dyn Fn() -> BoxFuture<'static, Result<T, TaskError>> + Send + Sync;

/// Unit of work accepted by [`WorkQueue::submit`](crate::WorkQueue::submit).
pub struct QueueTask<T> {
    id: String,
    execute: Box<AttemptFn<T>>,
    max_retries: Option<u32>,
}

impl<T> QueueTask<T> {
    /// Build a task from a closure returning one attempt's future.
    pub fn new<F, Fut>(id: impl Into<String>, execute: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        Self {
            id: id.into(),
            execute: Box::new(move || Box::pin(execute())),
            max_retries: None,
        }
    }

    /// Override the queue's default retry budget for this task.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    pub(crate) fn attempt(&self) -> BoxFuture<'static, Result<T, TaskError>> {
        (self.execute)()
    }
}

impl<T> fmt::Debug for QueueTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueTask")
            .field("id", &self.id)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Future returned by `submit`; resolves with the task's final result.
///
/// Dropping the handle does not cancel the task.
#[must_use = "a TaskHandle does nothing unless awaited"]
pub struct TaskHandle<T> {
    id: String,
    receiver: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(id: String, receiver: oneshot::Receiver<Result<T, TaskError>>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Sender dropped without a result: the attempt future panicked or the
            // runtime shut down underneath it.
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::aborted())),
            Poll::Pending => Poll::Pending,
        }
    }
}
