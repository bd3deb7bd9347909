//! Configuration module
//!
//! Dispatcher timing and pool settings, with defaults and loading from the
//! environment.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

const SLEEP_INTERVAL_MS: u64 = 1000;
const TASK_TIMEOUT_MS: u64 = 10_000;
const WORKER_POOL_SIZE: usize = 1;

pub const SLEEP_INTERVAL_ENV: &str = "TASKD_SLEEP_INTERVAL_MS";
pub const TASK_TIMEOUT_ENV: &str = "TASKD_TASK_TIMEOUT_MS";
pub const WORKER_POOL_SIZE_ENV: &str = "TASKD_WORKER_POOL_SIZE";

/// Timing and capacity settings for a dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Pause between cycles.
    pub sleep_interval: Duration,
    /// Budget for the whole worker chain of one task.
    pub task_timeout: Duration,
    /// Maximum number of worker chains executing at once.
    pub worker_pool_size: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            sleep_interval: Duration::from_millis(SLEEP_INTERVAL_MS),
            task_timeout: Duration::from_millis(TASK_TIMEOUT_MS),
            worker_pool_size: WORKER_POOL_SIZE,
        }
    }
}

impl DispatcherSettings {
    /// Load settings from `TASKD_*` environment variables (and `.env` if present).
    ///
    /// Unset variables keep their defaults; values that do not parse are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let defaults = Self::default();

        let sleep_interval = parse_var(&lookup, SLEEP_INTERVAL_ENV)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.sleep_interval);
        let task_timeout = parse_var(&lookup, TASK_TIMEOUT_ENV)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.task_timeout);
        let worker_pool_size =
            parse_var(&lookup, WORKER_POOL_SIZE_ENV)?.unwrap_or(defaults.worker_pool_size);

        let settings = Self {
            sleep_interval,
            task_timeout,
            worker_pool_size,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_pool_size < 1 {
            return Err(ConfigError::InvalidWorkerPoolSize(self.worker_pool_size));
        }
        if self.sleep_interval.is_zero() {
            return Err(ConfigError::NonPositiveDuration {
                field: "sleep_interval",
            });
        }
        if self.task_timeout.is_zero() {
            return Err(ConfigError::NonPositiveDuration {
                field: "task_timeout",
            });
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}
