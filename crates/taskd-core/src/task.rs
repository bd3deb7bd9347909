use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Outcome reported by a worker for one execution attempt.
///
/// Only [`TaskStatus::Done`] causes the dispatcher to remove the task. The other
/// values all leave the task queued; they stay distinct so that callers can tell
/// them apart in logs and metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Done,
    Stopped,
    Running,
    Failed,
}

impl TaskStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Stopped => write!(f, "stopped"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(TaskStatus::Done),
            "stopped" => Ok(TaskStatus::Stopped),
            "running" => Ok(TaskStatus::Running),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

/// A unit of work waiting in a queue.
///
/// Tasks are values: the dispatcher reads them and may remove them by `urn`, but
/// never changes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Routing key used to select the workers that handle this task.
    pub path: String,
    /// Earliest time the task may run.
    pub run_time: DateTime<Utc>,
    /// Opaque payload, passed through to workers untouched.
    pub data: serde_json::Value,
    /// Stable identity used for removal.
    pub urn: String,
}

impl Task {
    /// Create a task with a freshly generated urn.
    pub fn new(
        path: impl Into<String>,
        run_time: DateTime<Utc>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            path: path.into(),
            run_time,
            data,
            urn: format!("urn:task:{}", Uuid::new_v4()),
        }
    }

    pub fn with_urn(
        path: impl Into<String>,
        run_time: DateTime<Utc>,
        data: serde_json::Value,
        urn: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            run_time,
            data,
            urn: urn.into(),
        }
    }

    /// Create a task whose run time is given in epoch milliseconds.
    ///
    /// Returns `None` when the value is outside the representable range.
    pub fn from_millis(
        path: impl Into<String>,
        run_time_millis: i64,
        data: serde_json::Value,
        urn: impl Into<String>,
    ) -> Option<Self> {
        let run_time = Utc.timestamp_millis_opt(run_time_millis).single()?;
        Some(Self::with_urn(path, run_time, data, urn))
    }

    pub fn run_time_millis(&self) -> i64 {
        self.run_time.timestamp_millis()
    }

    /// A task is ready once its run time is not in the future.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.run_time <= now
    }
}
