//! Task dispatcher: poll loop, queue leasing, and shutdown.
//!
//! Each cycle leases a queue handle, looks at the next task, runs the workers
//! matching its path when it is ready, removes it if a worker reported
//! [`TaskStatus::Done`], and releases the handle. Cycles are strictly
//! sequential; the loop sleeps between them until shutdown is requested.
//!
//! Shutdown is cooperative: [`TaskDispatcher::shutdown`] lets the in-flight
//! cycle finish (including the release of its queue handle) and never
//! interrupts a running worker.

use chrono::Utc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout_at, Instant};

use taskd_core::{
    DispatcherError, DispatcherSettings, QueueError, ShutdownSignal, Task, TaskQueue,
    TaskQueueFactory, TaskStatus, TaskWorker,
};

use crate::builder::Builder;
use crate::chain::{matching_workers, run_chain, ChainOutcome};

/// Lifecycle of a dispatcher. A stopped dispatcher cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatcherState {
    Created = 0,
    Running = 1,
    ShuttingDown = 2,
    Stopped = 3,
}

impl DispatcherState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DispatcherState::Created,
            1 => DispatcherState::Running,
            2 => DispatcherState::ShuttingDown,
            _ => DispatcherState::Stopped,
        }
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The queue had no task.
    Idle,
    /// The next task is scheduled in the future and was left alone.
    NotReady,
    /// A worker completed the task and it was removed.
    Removed { urn: String },
    /// Workers ran (or none matched) and the task stays queued.
    Retained { urn: String },
    /// The task's worker chain ran out of time; the task stays queued.
    TimedOut { urn: String },
    /// The queue could not be leased or read.
    QueueUnavailable,
    /// The task was completed but could not be removed; it will be seen again.
    RemovalFailed { urn: String },
}

pub struct TaskDispatcher {
    settings: DispatcherSettings,
    factory: Arc<dyn TaskQueueFactory>,
    workers: Vec<Arc<dyn TaskWorker>>,
    pool: Arc<Semaphore>,
    shutdown: ShutdownSignal,
    state: AtomicU8,
}

impl TaskDispatcher {
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn new(
        settings: DispatcherSettings,
        factory: Arc<dyn TaskQueueFactory>,
        workers: Vec<Arc<dyn TaskWorker>>,
    ) -> Self {
        let pool = Arc::new(Semaphore::new(settings.worker_pool_size));
        Self {
            settings,
            factory,
            workers,
            pool,
            shutdown: ShutdownSignal::new(),
            state: AtomicU8::new(DispatcherState::Created as u8),
        }
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Current lifecycle state. `ShuttingDown` is reported while the loop is
    /// still running after the shutdown signal fired, however it was triggered.
    pub fn state(&self) -> DispatcherState {
        let state = DispatcherState::from_u8(self.state.load(Ordering::SeqCst));
        if state == DispatcherState::Running && self.shutdown.is_triggered() {
            return DispatcherState::ShuttingDown;
        }
        state
    }

    /// Signal that stops this dispatcher when triggered. Hand it to workers or
    /// signal handlers that need to stop the loop.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Ask the loop to stop after the current cycle. Safe to call repeatedly,
    /// from any thread, and before [`TaskDispatcher::run`].
    pub fn shutdown(&self) {
        if !self.shutdown.is_triggered() {
            tracing::info!("Task dispatcher shutdown requested");
        }
        self.shutdown.trigger();
    }

    /// Run cycles until shutdown is requested.
    ///
    /// Returns once the cycle in progress at shutdown has finished. Errors from
    /// queues and workers are logged, never returned; the only error is calling
    /// `run` on a dispatcher that was already started.
    pub async fn run(&self) -> Result<(), DispatcherError> {
        self.state
            .compare_exchange(
                DispatcherState::Created as u8,
                DispatcherState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| DispatcherError::AlreadyStarted)?;
        let _stopped = MarkStopped(&self.state);

        tracing::info!(
            sleep_interval_ms = self.settings.sleep_interval.as_millis() as u64,
            task_timeout_ms = self.settings.task_timeout.as_millis() as u64,
            worker_pool_size = self.settings.worker_pool_size,
            workers = self.workers.len(),
            "Task dispatcher started"
        );

        while !self.shutdown.is_triggered() {
            let outcome = self.run_cycle().await;
            tracing::trace!(?outcome, "Dispatch cycle finished");

            tokio::select! {
                _ = self.shutdown.triggered() => break,
                _ = sleep(self.settings.sleep_interval) => {}
            }
        }

        tracing::info!("Task dispatcher stopped");
        Ok(())
    }

    /// Run exactly one cycle: lease, inspect, dispatch, release.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let mut lease = match self.factory.acquire().await {
            Ok(queue) => Lease::new(self.factory.clone(), queue),
            Err(e) => {
                tracing::error!(error = %e, "Failed to acquire task queue");
                return CycleOutcome::QueueUnavailable;
            }
        };

        let outcome = match lease.queue() {
            Some(queue) => self.process_next(queue).await,
            None => CycleOutcome::QueueUnavailable,
        };
        lease.release().await;
        outcome
    }

    async fn process_next(&self, queue: &mut dyn TaskQueue) -> CycleOutcome {
        let task = match queue.peek().await {
            Ok(Some(task)) => task,
            Ok(None) => {
                tracing::trace!("No tasks available in queue");
                return CycleOutcome::Idle;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read next task from queue");
                return CycleOutcome::QueueUnavailable;
            }
        };

        if !task.is_ready(Utc::now()) {
            tracing::trace!(
                task.urn = %task.urn,
                run_time = %task.run_time,
                "Next task is not ready yet"
            );
            return CycleOutcome::NotReady;
        }

        let urn = task.urn.clone();
        match self.dispatch(task).await {
            ChainOutcome::Done { worker } => self.remove(queue, urn, &worker).await,
            ChainOutcome::NotDone { statuses } => {
                tracing::debug!(task.urn = %urn, ?statuses, "Task not completed, leaving it queued");
                CycleOutcome::Retained { urn }
            }
            ChainOutcome::Expired => CycleOutcome::TimedOut { urn },
        }
    }

    /// Run the task's worker chain on the pool, bounded by the task timeout.
    ///
    /// The budget covers waiting for a pool slot as well as the chain itself.
    /// When it runs out the chain is left to finish in the background; it starts
    /// no further workers and its result is ignored.
    #[tracing::instrument(skip(self, task), fields(task.urn = %task.urn, task.path = %task.path))]
    async fn dispatch(&self, task: Task) -> ChainOutcome {
        let workers = matching_workers(&self.workers, &task.path);
        if workers.is_empty() {
            tracing::debug!("No registered worker matches task path");
            return ChainOutcome::NotDone {
                statuses: Vec::new(),
            };
        }

        let deadline = Instant::now() + self.settings.task_timeout;

        let permit = match timeout_at(deadline, self.pool.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Worker pool closed");
                return ChainOutcome::NotDone {
                    statuses: Vec::new(),
                };
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.settings.task_timeout.as_millis() as u64,
                    "No worker pool slot freed up before the task timeout"
                );
                return ChainOutcome::Expired;
            }
        };

        let handle = tokio::spawn(run_chain(task, workers, deadline, permit));

        match timeout_at(deadline, handle).await {
            Ok(Ok(outcome)) => {
                if outcome == ChainOutcome::Expired {
                    tracing::warn!(
                        timeout_ms = self.settings.task_timeout.as_millis() as u64,
                        "Task timed out before all workers ran"
                    );
                }
                outcome
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Worker chain aborted");
                ChainOutcome::NotDone {
                    statuses: vec![TaskStatus::Failed],
                }
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.settings.task_timeout.as_millis() as u64,
                    "Task timed out; a late result will be ignored"
                );
                ChainOutcome::Expired
            }
        }
    }

    async fn remove(&self, queue: &mut dyn TaskQueue, urn: String, worker: &str) -> CycleOutcome {
        match queue.remove(&urn).await {
            Ok(()) => {
                tracing::info!(task.urn = %urn, worker = %worker, "Task completed and removed from queue");
                CycleOutcome::Removed { urn }
            }
            Err(e) => {
                log_removal_failure(&urn, &e);
                CycleOutcome::RemovalFailed { urn }
            }
        }
    }
}

/// Sets the state to `Stopped` when `run` returns or unwinds.
struct MarkStopped<'a>(&'a AtomicU8);

impl Drop for MarkStopped<'_> {
    fn drop(&mut self) {
        self.0.store(DispatcherState::Stopped as u8, Ordering::SeqCst);
    }
}

/// A queue handle leased for one cycle.
///
/// [`Lease::release`] hands it back. If the lease is dropped without being
/// released (the cycle unwound or its future was dropped), the release is
/// spawned onto the current runtime instead.
struct Lease {
    factory: Arc<dyn TaskQueueFactory>,
    queue: Option<Box<dyn TaskQueue>>,
}

impl Lease {
    fn new(factory: Arc<dyn TaskQueueFactory>, queue: Box<dyn TaskQueue>) -> Self {
        Self {
            factory,
            queue: Some(queue),
        }
    }

    fn queue(&mut self) -> Option<&mut (dyn TaskQueue + 'static)> {
        self.queue.as_deref_mut()
    }

    async fn release(mut self) {
        if let Some(queue) = self.queue.take() {
            self.factory.release(queue).await;
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let Some(queue) = self.queue.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("Cycle ended abnormally, releasing task queue in the background");
                let factory = self.factory.clone();
                handle.spawn(async move { factory.release(queue).await });
            }
            Err(_) => {
                tracing::error!("Cycle ended abnormally outside a runtime; task queue not released");
            }
        }
    }
}

fn log_removal_failure(urn: &str, error: &QueueError) {
    if error.is_recoverable() {
        tracing::error!(task.urn = %urn, error = %error, "Failed to remove completed task, will retry next cycle");
    } else {
        tracing::warn!(task.urn = %urn, error = %error, "Completed task was already gone from queue");
    }
}
