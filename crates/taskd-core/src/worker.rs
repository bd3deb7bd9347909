//! Task worker trait and path matching.

use async_trait::async_trait;

use crate::task::{Task, TaskStatus};

/// A handler for tasks on some set of paths.
///
/// The dispatcher may call `run` on the same worker from several pool slots at
/// once, so implementations must be safe to share. `run` may take as long as it
/// likes; the dispatcher bounds the whole worker chain of a task with its task
/// timeout and ignores results that arrive late.
#[async_trait]
pub trait TaskWorker: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether this worker handles tasks on `path`.
    fn matches(&self, path: &str) -> bool;

    /// Execute the task and report the outcome. An `Err` counts as
    /// [`TaskStatus::Failed`].
    async fn run(&self, task: &Task) -> anyhow::Result<TaskStatus>;
}

/// Path predicate for workers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Every path.
    #[default]
    Any,
    Exact(String),
    /// Paths equal to the prefix or nested below it (`/jobs` matches `/jobs/a`,
    /// not `/jobsx`).
    Prefix(String),
}

impl PathPattern {
    pub fn exact(path: impl Into<String>) -> Self {
        PathPattern::Exact(path.into())
    }

    pub fn prefix(path: impl Into<String>) -> Self {
        PathPattern::Prefix(path.into())
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Any => true,
            PathPattern::Exact(expected) => path == expected,
            PathPattern::Prefix(prefix) => {
                let prefix = prefix.trim_end_matches('/');
                match path.strip_prefix(prefix) {
                    Some(rest) => rest.is_empty() || rest.starts_with('/'),
                    None => false,
                }
            }
        }
    }
}
