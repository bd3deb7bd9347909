//! Error types module
//!
//! Three families of errors exist: configuration errors raised once when a
//! dispatcher is built, queue errors raised by queue backends during a cycle, and
//! dispatcher errors for misuse of the dispatcher lifecycle. Worker failures are
//! not represented here; workers return `anyhow::Result` and a failure counts as
//! [`crate::TaskStatus::Failed`].

/// Errors raised by a [`crate::TaskQueue`] or [`crate::TaskQueueFactory`].
///
/// All variants are transient from the dispatcher's point of view: the cycle is
/// abandoned and the task is looked at again on a later cycle.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Task queue unavailable: {0}")]
    Unavailable(String),

    #[error("Task not found in queue: {urn}")]
    NotFound { urn: String },

    #[error("Task queue backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

impl QueueError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        QueueError::Unavailable(message.into())
    }

    pub fn not_found(urn: impl Into<String>) -> Self {
        QueueError::NotFound { urn: urn.into() }
    }

    /// Whether retrying the operation later may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            QueueError::Unavailable(_) | QueueError::Backend(_) => true,
            // Someone else already removed the task; nothing left to retry.
            QueueError::NotFound { .. } => false,
        }
    }
}

impl From<anyhow::Error> for QueueError {
    fn from(err: anyhow::Error) -> Self {
        QueueError::Backend(err)
    }
}

/// Invalid dispatcher configuration, reported by `Builder::build` or when loading
/// settings from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("A task queue factory must be configured")]
    MissingQueueFactory,

    #[error("Worker pool size must be at least 1, got {0}")]
    InvalidWorkerPoolSize(usize),

    #[error("At least one task worker must be registered")]
    NoWorkers,

    #[error("{field} must be greater than zero")]
    NonPositiveDuration { field: &'static str },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Lifecycle misuse of a dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatcherError {
    #[error("Task dispatcher has already been started; dispatchers cannot be restarted")]
    AlreadyStarted,
}
