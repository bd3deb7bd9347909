//! Task dispatcher: polling loop, worker-chain execution under a bounded pool and
//! per-task timeout, and an in-memory queue.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskd_core::{NullTaskWorker, PathPattern};
//! use taskd_worker::{InMemoryTaskQueue, InMemoryTaskQueueFactory, TaskDispatcher};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let queue = InMemoryTaskQueue::default();
//! let dispatcher = Arc::new(
//!     TaskDispatcher::builder()
//!         .sleep_interval(Duration::from_millis(500))
//!         .task_timeout(Duration::from_secs(30))
//!         .worker_pool_size(2)
//!         .task_queue_factory(Arc::new(InMemoryTaskQueueFactory::new(queue)))
//!         .register_task_worker(Arc::new(NullTaskWorker::new(PathPattern::Any)))
//!         .build()?,
//! );
//!
//! let runner = {
//!     let dispatcher = dispatcher.clone();
//!     tokio::spawn(async move { dispatcher.run().await })
//! };
//! dispatcher.shutdown();
//! runner.await??;
//! # Ok(())
//! # }
//! ```

pub mod builder;
mod chain;
pub mod dispatcher;
pub mod memory;

pub use builder::Builder;
pub use dispatcher::{CycleOutcome, DispatcherState, TaskDispatcher};
pub use memory::{InMemoryTaskQueue, InMemoryTaskQueueFactory};
