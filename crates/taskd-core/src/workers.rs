//! Reference worker implementations.
//!
//! [`NullTaskWorker`] completes every task it sees. [`RecordingTaskWorker`]
//! records what it was asked to do and answers with a fixed status, optionally
//! holding on to the task first; it is the building block for deterministic
//! dispatcher tests and for demo setups.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use crate::shutdown::ShutdownSignal;
use crate::task::{Task, TaskStatus};
use crate::worker::{PathPattern, TaskWorker};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Worker that reports every task as done.
#[derive(Debug, Default)]
pub struct NullTaskWorker {
    pattern: PathPattern,
    last_status: Mutex<Option<TaskStatus>>,
}

impl NullTaskWorker {
    pub fn new(pattern: PathPattern) -> Self {
        Self {
            pattern,
            last_status: Mutex::new(None),
        }
    }

    /// Status returned by the most recent run, `None` if it never ran.
    pub fn status(&self) -> Option<TaskStatus> {
        *lock(&self.last_status)
    }
}

#[async_trait]
impl TaskWorker for NullTaskWorker {
    fn name(&self) -> &str {
        "null"
    }

    fn matches(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }

    async fn run(&self, task: &Task) -> anyhow::Result<TaskStatus> {
        tracing::debug!(task.urn = %task.urn, "Null worker completing task");
        *lock(&self.last_status) = Some(TaskStatus::Done);
        Ok(TaskStatus::Done)
    }
}

/// How long a [`RecordingTaskWorker`] holds a task before answering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Hold {
    #[default]
    None,
    For(Duration),
    /// Never answer.
    Forever,
}

/// Worker that records invocations and returns a configured status.
///
/// Defaults to [`TaskStatus::Running`], i.e. "made progress, keep the task".
#[derive(Debug)]
pub struct RecordingTaskWorker {
    name: String,
    pattern: PathPattern,
    status: TaskStatus,
    hold: Hold,
    invocations: Mutex<Vec<String>>,
    shutdown: OnceLock<ShutdownSignal>,
}

impl Default for RecordingTaskWorker {
    fn default() -> Self {
        Self::new("recording")
    }
}

impl RecordingTaskWorker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: PathPattern::Any,
            status: TaskStatus::Running,
            hold: Hold::None,
            invocations: Mutex::new(Vec::new()),
            shutdown: OnceLock::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: PathPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_hold(mut self, hold: Hold) -> Self {
        self.hold = hold;
        self
    }

    /// Trigger `signal` whenever this worker starts running a task.
    ///
    /// Only the first attached signal is kept; returns `false` if one was
    /// already attached.
    pub fn shutdown_on_run(&self, signal: ShutdownSignal) -> bool {
        self.shutdown.set(signal).is_ok()
    }

    pub fn has_run(&self) -> bool {
        !lock(&self.invocations).is_empty()
    }

    pub fn invocation_count(&self) -> usize {
        lock(&self.invocations).len()
    }

    /// Urns of the tasks this worker was invoked with, oldest first.
    pub fn invocations(&self) -> Vec<String> {
        lock(&self.invocations).clone()
    }
}

#[async_trait]
impl TaskWorker for RecordingTaskWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }

    async fn run(&self, task: &Task) -> anyhow::Result<TaskStatus> {
        if let Some(signal) = self.shutdown.get() {
            signal.trigger();
        }

        lock(&self.invocations).push(task.urn.clone());
        tracing::debug!(worker = %self.name, task.urn = %task.urn, "Recording worker invoked");

        match self.hold {
            Hold::None => {}
            Hold::For(duration) => tokio::time::sleep(duration).await,
            Hold::Forever => std::future::pending::<()>().await,
        }

        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(urn: &str) -> Task {
        Task::with_urn("/", Utc::now(), serde_json::Value::Null, urn)
    }

    #[tokio::test]
    async fn null_worker_reports_done() {
        let worker = NullTaskWorker::default();
        assert_eq!(worker.status(), None);
        let status = worker.run(&task("abc")).await.unwrap();
        assert_eq!(status, TaskStatus::Done);
        assert_eq!(worker.status(), Some(TaskStatus::Done));
    }

    #[tokio::test]
    async fn recording_worker_defaults_to_running() {
        let worker = RecordingTaskWorker::default();
        assert!(!worker.has_run());
        let status = worker.run(&task("abc")).await.unwrap();
        assert_eq!(status, TaskStatus::Running);
        assert_eq!(worker.invocations(), vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn recording_worker_triggers_attached_shutdown() {
        let signal = ShutdownSignal::new();
        let worker = RecordingTaskWorker::new("stopper").with_status(TaskStatus::Stopped);
        assert!(worker.shutdown_on_run(signal.clone()));
        assert!(!worker.shutdown_on_run(ShutdownSignal::new()));

        let status = worker.run(&task("abc")).await.unwrap();
        assert_eq!(status, TaskStatus::Stopped);
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn forever_hold_never_answers() {
        let worker = RecordingTaskWorker::default().with_hold(Hold::Forever);
        let task = task("abc");
        let result =
            tokio::time::timeout(Duration::from_millis(50), worker.run(&task)).await;
        assert!(result.is_err());
        assert!(worker.has_run());
    }

    #[test]
    fn pattern_limits_matches() {
        let worker = RecordingTaskWorker::default().with_pattern(PathPattern::exact("/a"));
        assert!(worker.matches("/a"));
        assert!(!worker.matches("/b"));
    }
}
