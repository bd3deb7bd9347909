//! taskd core library
//!
//! This crate provides the task model, the worker and queue contracts, error types
//! and configuration shared by the dispatcher and its callers.

pub mod config;
pub mod error;
pub mod queue;
pub mod shutdown;
pub mod task;
pub mod worker;
pub mod workers;

// Re-export commonly used types
pub use config::DispatcherSettings;
pub use error::{ConfigError, DispatcherError, QueueError};
pub use queue::{TaskQueue, TaskQueueFactory};
pub use shutdown::ShutdownSignal;
pub use task::{Task, TaskStatus};
pub use worker::{PathPattern, TaskWorker};
pub use workers::{Hold, NullTaskWorker, RecordingTaskWorker};
