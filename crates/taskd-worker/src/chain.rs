//! Execution of one task's worker chain.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;

use taskd_core::{Task, TaskStatus, TaskWorker};

/// Result of running the matching workers for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChainOutcome {
    /// A worker confirmed completion; later workers were skipped.
    Done { worker: String },
    /// Every worker ran and none confirmed completion.
    NotDone { statuses: Vec<TaskStatus> },
    /// The deadline passed before the chain finished.
    Expired,
}

/// Workers whose path predicate accepts `path`, in registration order.
///
/// A predicate that panics counts as not matching.
pub(crate) fn matching_workers(
    workers: &[Arc<dyn TaskWorker>],
    path: &str,
) -> Vec<Arc<dyn TaskWorker>> {
    workers
        .iter()
        .filter(|worker| match catch_unwind(AssertUnwindSafe(|| worker.matches(path))) {
            Ok(matches) => matches,
            Err(_) => {
                tracing::error!(worker = %worker.name(), task.path = %path, "Task worker path matcher panicked");
                false
            }
        })
        .cloned()
        .collect()
}

/// Invoke `workers` in order until one reports [`TaskStatus::Done`].
///
/// Non-done statuses do not stop the chain. No new worker is started once
/// `deadline` has passed. The pool permit is held until the chain returns, so a
/// chain that outlives its deadline keeps its slot occupied.
pub(crate) async fn run_chain(
    task: Task,
    workers: Vec<Arc<dyn TaskWorker>>,
    deadline: Instant,
    _permit: OwnedSemaphorePermit,
) -> ChainOutcome {
    let task = Arc::new(task);
    let mut statuses = Vec::with_capacity(workers.len());

    for worker in workers {
        if Instant::now() >= deadline {
            return ChainOutcome::Expired;
        }
        let name = worker.name().to_owned();
        let status = invoke(worker, task.clone(), &name).await;
        if status.is_done() {
            return ChainOutcome::Done { worker: name };
        }
        statuses.push(status);
    }

    ChainOutcome::NotDone { statuses }
}

/// Run a single worker on its own tokio task so a panic is contained and
/// reported as `Failed`.
async fn invoke(worker: Arc<dyn TaskWorker>, task: Arc<Task>, name: &str) -> TaskStatus {
    let urn = task.urn.clone();
    let handle = tokio::spawn(async move { worker.run(&task).await });

    match handle.await {
        Ok(Ok(status)) => {
            tracing::debug!(worker = %name, task.urn = %urn, status = %status, "Task worker finished");
            status
        }
        Ok(Err(e)) => {
            tracing::warn!(worker = %name, task.urn = %urn, error = %e, "Task worker failed");
            TaskStatus::Failed
        }
        Err(e) => {
            tracing::error!(worker = %name, task.urn = %urn, error = %e, "Task worker panicked");
            TaskStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;
    use taskd_core::{Hold, RecordingTaskWorker};
    use tokio::sync::Semaphore;

    /// Appends its name to a shared log, then answers with `status`.
    struct OrderedWorker {
        name: &'static str,
        status: TaskStatus,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl TaskWorker for OrderedWorker {
        fn name(&self) -> &str {
            self.name
        }

        fn matches(&self, _path: &str) -> bool {
            true
        }

        async fn run(&self, _task: &Task) -> anyhow::Result<TaskStatus> {
            self.log.lock().unwrap().push(self.name);
            Ok(self.status)
        }
    }

    struct FailingWorker;

    #[async_trait]
    impl TaskWorker for FailingWorker {
        fn matches(&self, _path: &str) -> bool {
            true
        }

        async fn run(&self, _task: &Task) -> anyhow::Result<TaskStatus> {
            anyhow::bail!("backend exploded")
        }
    }

    struct PanickingWorker;

    #[async_trait]
    impl TaskWorker for PanickingWorker {
        fn matches(&self, _path: &str) -> bool {
            true
        }

        async fn run(&self, _task: &Task) -> anyhow::Result<TaskStatus> {
            panic!("worker bug")
        }
    }

    fn task() -> Task {
        Task::with_urn("/", Utc::now(), serde_json::Value::Null, "abc")
    }

    async fn permit() -> OwnedSemaphorePermit {
        Arc::new(Semaphore::new(1)).acquire_owned().await.unwrap()
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    fn ordered(
        name: &'static str,
        status: TaskStatus,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn TaskWorker> {
        Arc::new(OrderedWorker {
            name,
            status,
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn non_done_statuses_do_not_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let workers = vec![
            ordered("first", TaskStatus::Stopped, &log),
            ordered("second", TaskStatus::Failed, &log),
            ordered("third", TaskStatus::Running, &log),
        ];

        let outcome = run_chain(task(), workers, far_deadline(), permit().await).await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(
            outcome,
            ChainOutcome::NotDone {
                statuses: vec![TaskStatus::Stopped, TaskStatus::Failed, TaskStatus::Running]
            }
        );
    }

    #[tokio::test]
    async fn stops_at_first_done() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let workers = vec![
            ordered("observer", TaskStatus::Running, &log),
            ordered("finisher", TaskStatus::Done, &log),
            ordered("never", TaskStatus::Done, &log),
        ];

        let outcome = run_chain(task(), workers, far_deadline(), permit().await).await;

        assert_eq!(*log.lock().unwrap(), vec!["observer", "finisher"]);
        assert_eq!(
            outcome,
            ChainOutcome::Done {
                worker: "finisher".to_string()
            }
        );
    }

    #[tokio::test]
    async fn errors_and_panics_count_as_failed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let workers: Vec<Arc<dyn TaskWorker>> = vec![
            Arc::new(FailingWorker),
            Arc::new(PanickingWorker),
            ordered("after", TaskStatus::Done, &log),
        ];

        let outcome = run_chain(task(), workers, far_deadline(), permit().await).await;

        assert_eq!(*log.lock().unwrap(), vec!["after"]);
        assert!(matches!(outcome, ChainOutcome::Done { .. }));
    }

    struct PanickingMatcher;

    #[async_trait]
    impl TaskWorker for PanickingMatcher {
        fn matches(&self, _path: &str) -> bool {
            panic!("matcher bug")
        }

        async fn run(&self, _task: &Task) -> anyhow::Result<TaskStatus> {
            Ok(TaskStatus::Done)
        }
    }

    #[test]
    fn panicking_matcher_is_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let workers: Vec<Arc<dyn TaskWorker>> = vec![
            ordered("before", TaskStatus::Running, &log),
            Arc::new(PanickingMatcher),
            ordered("after", TaskStatus::Done, &log),
        ];

        let names: Vec<String> = matching_workers(&workers, "/")
            .iter()
            .map(|worker| worker.name().to_owned())
            .collect();

        assert_eq!(names, vec!["before", "after"]);
    }

    #[tokio::test]
    async fn expired_deadline_skips_remaining_workers() {
        let slow = Arc::new(
            RecordingTaskWorker::new("slow").with_hold(Hold::For(Duration::from_millis(50))),
        );
        let next = Arc::new(RecordingTaskWorker::new("next").with_status(TaskStatus::Done));
        let workers: Vec<Arc<dyn TaskWorker>> = vec![slow.clone(), next.clone()];

        let deadline = Instant::now() + Duration::from_millis(10);
        let outcome = run_chain(task(), workers, deadline, permit().await).await;

        assert_eq!(outcome, ChainOutcome::Expired);
        assert!(slow.has_run());
        assert!(!next.has_run());
    }

    #[tokio::test]
    async fn permit_released_when_chain_returns() {
        let pool = Arc::new(Semaphore::new(1));
        let permit = pool.clone().acquire_owned().await.unwrap();
        assert_eq!(pool.available_permits(), 0);

        run_chain(task(), Vec::new(), far_deadline(), permit).await;

        assert_eq!(pool.available_permits(), 1);
    }
}
