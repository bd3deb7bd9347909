//! Dispatcher builder.

use std::sync::Arc;
use std::time::Duration;

use taskd_core::{ConfigError, DispatcherSettings, TaskQueueFactory, TaskWorker};

use crate::dispatcher::TaskDispatcher;

/// Collects dispatcher configuration; [`Builder::build`] validates it.
///
/// Timing and pool size start from [`DispatcherSettings::default`]. A queue
/// factory and at least one worker are required.
#[derive(Default)]
pub struct Builder {
    settings: DispatcherSettings,
    factory: Option<Arc<dyn TaskQueueFactory>>,
    workers: Vec<Arc<dyn TaskWorker>>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace sleep interval, task timeout and pool size at once.
    pub fn settings(mut self, settings: DispatcherSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn sleep_interval(mut self, interval: Duration) -> Self {
        self.settings.sleep_interval = interval;
        self
    }

    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.settings.task_timeout = timeout;
        self
    }

    pub fn worker_pool_size(mut self, size: usize) -> Self {
        self.settings.worker_pool_size = size;
        self
    }

    pub fn task_queue_factory(mut self, factory: Arc<dyn TaskQueueFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Add a worker. Workers matching a task run in registration order.
    pub fn register_task_worker(mut self, worker: Arc<dyn TaskWorker>) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn build(self) -> Result<TaskDispatcher, ConfigError> {
        let factory = self.factory.ok_or(ConfigError::MissingQueueFactory)?;
        self.settings.validate()?;
        if self.workers.is_empty() {
            return Err(ConfigError::NoWorkers);
        }

        Ok(TaskDispatcher::new(self.settings, factory, self.workers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryTaskQueue, InMemoryTaskQueueFactory};
    use taskd_core::NullTaskWorker;

    fn factory() -> Arc<dyn TaskQueueFactory> {
        Arc::new(InMemoryTaskQueueFactory::new(InMemoryTaskQueue::default()))
    }

    fn complete() -> Builder {
        Builder::new()
            .task_queue_factory(factory())
            .register_task_worker(Arc::new(NullTaskWorker::default()))
    }

    fn build_err(builder: Builder) -> ConfigError {
        match builder.build() {
            Ok(_) => panic!("expected a configuration error"),
            Err(e) => e,
        }
    }

    #[test]
    fn builds_with_defaults() {
        let dispatcher = complete().build().unwrap();
        assert_eq!(dispatcher.settings(), &DispatcherSettings::default());
        assert_eq!(dispatcher.worker_count(), 1);
    }

    #[test]
    fn requires_factory() {
        let builder = Builder::new().register_task_worker(Arc::new(NullTaskWorker::default()));
        assert_eq!(build_err(builder), ConfigError::MissingQueueFactory);
    }

    #[test]
    fn requires_workers() {
        let builder = Builder::new().task_queue_factory(factory());
        assert_eq!(build_err(builder), ConfigError::NoWorkers);
    }

    #[test]
    fn rejects_empty_pool() {
        assert_eq!(
            build_err(complete().worker_pool_size(0)),
            ConfigError::InvalidWorkerPoolSize(0)
        );
    }

    #[test]
    fn rejects_zero_durations() {
        assert_eq!(
            build_err(complete().sleep_interval(Duration::ZERO)),
            ConfigError::NonPositiveDuration {
                field: "sleep_interval"
            }
        );
        assert_eq!(
            build_err(complete().task_timeout(Duration::ZERO)),
            ConfigError::NonPositiveDuration {
                field: "task_timeout"
            }
        );
    }

    #[test]
    fn individual_setters_override_settings() {
        let dispatcher = complete()
            .settings(DispatcherSettings {
                sleep_interval: Duration::from_secs(5),
                task_timeout: Duration::from_secs(5),
                worker_pool_size: 8,
            })
            .task_timeout(Duration::from_millis(750))
            .build()
            .unwrap();

        assert_eq!(dispatcher.settings().sleep_interval, Duration::from_secs(5));
        assert_eq!(dispatcher.settings().task_timeout, Duration::from_millis(750));
        assert_eq!(dispatcher.settings().worker_pool_size, 8);
    }
}
