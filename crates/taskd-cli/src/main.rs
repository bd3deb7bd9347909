//! taskd — runs a task dispatcher over an in-memory queue.
//!
//! Settings come from `TASKD_*` environment variables (see `taskd_core::config`)
//! and can be overridden on the command line. Ctrl-C stops the dispatcher after
//! the cycle in progress.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use taskd_core::{
    DispatcherSettings, NullTaskWorker, PathPattern, Task, TaskStatus, TaskWorker,
};
use taskd_infra::{init_telemetry, shutdown_telemetry, LogFormat};
use taskd_worker::{InMemoryTaskQueue, InMemoryTaskQueueFactory, TaskDispatcher};

#[derive(Parser)]
#[command(name = "taskd", about = "Background task dispatcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dispatcher until interrupted
    Run {
        /// Pause between cycles, in milliseconds
        #[arg(long)]
        sleep_ms: Option<u64>,
        /// Budget for all workers of one task, in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Maximum number of tasks processed at once
        #[arg(long)]
        pool_size: Option<usize>,
        /// Number of demo tasks to enqueue on `/demo`, spaced one second apart
        #[arg(long, default_value = "0")]
        seed: u32,
    },
}

/// Logs each task it sees and leaves completion to later workers.
struct LoggingWorker;

#[async_trait]
impl TaskWorker for LoggingWorker {
    fn name(&self) -> &str {
        "logging"
    }

    fn matches(&self, _path: &str) -> bool {
        true
    }

    async fn run(&self, task: &Task) -> anyhow::Result<TaskStatus> {
        tracing::info!(
            task.urn = %task.urn,
            task.path = %task.path,
            data = %task.data,
            "Processing task"
        );
        Ok(TaskStatus::Running)
    }
}

fn settings_from(
    sleep_ms: Option<u64>,
    timeout_ms: Option<u64>,
    pool_size: Option<usize>,
) -> anyhow::Result<DispatcherSettings> {
    let mut settings =
        DispatcherSettings::from_env().context("Failed to load dispatcher settings")?;
    if let Some(ms) = sleep_ms {
        settings.sleep_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = timeout_ms {
        settings.task_timeout = Duration::from_millis(ms);
    }
    if let Some(size) = pool_size {
        settings.worker_pool_size = size;
    }
    Ok(settings)
}

fn seed_queue(queue: &InMemoryTaskQueue, count: u32) {
    let now = Utc::now();
    for i in 0..count {
        queue.enqueue(Task::new(
            "/demo",
            now + ChronoDuration::seconds(i64::from(i)),
            serde_json::json!({ "sequence": i }),
        ));
    }
}

async fn run(settings: DispatcherSettings, seed: u32) -> anyhow::Result<()> {
    let queue = InMemoryTaskQueue::default();
    seed_queue(&queue, seed);

    let factory = Arc::new(InMemoryTaskQueueFactory::new(queue));
    let dispatcher = Arc::new(
        TaskDispatcher::builder()
            .settings(settings)
            .task_queue_factory(factory.clone())
            .register_task_worker(Arc::new(LoggingWorker))
            .register_task_worker(Arc::new(NullTaskWorker::new(PathPattern::prefix("/demo"))))
            .build()
            .context("Invalid dispatcher configuration")?,
    );

    let signal = dispatcher.shutdown_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            signal.trigger();
        }
    });

    dispatcher.run().await?;

    tracing::info!(
        remaining = factory.queue().len(),
        cycles = factory.released(),
        "Dispatcher exited"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("taskd=info", LogFormat::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            sleep_ms,
            timeout_ms,
            pool_size,
            seed,
        } => {
            let settings = settings_from(sleep_ms, timeout_ms, pool_size)?;
            run(settings, seed).await
        }
    };

    shutdown_telemetry().await;
    result
}
