//! Task queue contracts.
//!
//! The dispatcher never owns queue storage. Each cycle it leases a
//! [`TaskQueue`] handle from a [`TaskQueueFactory`], uses it, and hands it back
//! through [`TaskQueueFactory::release`] before the next cycle starts.

use async_trait::async_trait;

use crate::error::QueueError;
use crate::task::Task;

/// A handle onto a queue of tasks, leased for a single dispatch cycle.
#[async_trait]
pub trait TaskQueue: Send {
    /// Return the next candidate task without removing it.
    ///
    /// Candidates come out in run-time order. The task may not be ready yet;
    /// readiness is decided by the caller.
    async fn peek(&mut self) -> Result<Option<Task>, QueueError>;

    /// Remove the task with the given urn.
    async fn remove(&mut self, urn: &str) -> Result<(), QueueError>;

    /// Add a task. Used by producers; the dispatcher never enqueues.
    async fn push(&mut self, task: Task) -> Result<(), QueueError>;
}

/// Provider of queue handles.
///
/// `release` is called exactly once for every handle returned by `acquire`,
/// whatever the outcome of the cycle that used it.
#[async_trait]
pub trait TaskQueueFactory: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn TaskQueue>, QueueError>;

    /// Return a handle. Best effort; failures are the factory's to log.
    async fn release(&self, queue: Box<dyn TaskQueue>);
}
