//! In-memory task queue.
//!
//! Handles are cheap clones over shared storage, so a factory can lease a fresh
//! handle every cycle while producers keep their own clone to enqueue work.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use taskd_core::{QueueError, Task, TaskQueue, TaskQueueFactory};

/// Tasks kept in run-time order; ties keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskQueue {
    tasks: Arc<Mutex<Vec<Task>>>,
}

impl InMemoryTaskQueue {
    pub fn new(mut tasks: Vec<Task>) -> Self {
        tasks.sort_by_key(|task| task.run_time);
        Self {
            tasks: Arc::new(Mutex::new(tasks)),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<Task>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn enqueue(&self, task: Task) {
        let mut tasks = self.tasks();
        let index = tasks.partition_point(|queued| queued.run_time <= task.run_time);
        tasks.insert(index, task);
    }

    /// The task `peek` would return, without going through a lease.
    pub fn front(&self) -> Option<Task> {
        self.tasks().first().cloned()
    }

    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks().clone()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn peek(&mut self) -> Result<Option<Task>, QueueError> {
        Ok(self.front())
    }

    async fn remove(&mut self, urn: &str) -> Result<(), QueueError> {
        let mut tasks = self.tasks();
        match tasks.iter().position(|task| task.urn == urn) {
            Some(index) => {
                tasks.remove(index);
                Ok(())
            }
            None => Err(QueueError::not_found(urn)),
        }
    }

    async fn push(&mut self, task: Task) -> Result<(), QueueError> {
        self.enqueue(task);
        Ok(())
    }
}

/// Factory that leases handles over one [`InMemoryTaskQueue`] and counts leases.
#[derive(Debug, Default)]
pub struct InMemoryTaskQueueFactory {
    queue: InMemoryTaskQueue,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl InMemoryTaskQueueFactory {
    pub fn new(queue: InMemoryTaskQueue) -> Self {
        Self {
            queue,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn queue(&self) -> &InMemoryTaskQueue {
        &self.queue
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskQueueFactory for InMemoryTaskQueueFactory {
    async fn acquire(&self) -> Result<Box<dyn TaskQueue>, QueueError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.queue.clone()))
    }

    async fn release(&self, queue: Box<dyn TaskQueue>) {
        drop(queue);
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
