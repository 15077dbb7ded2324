//! Delayed one-shot tasks
//!
//! Tasks run once after a fixed delay on a dedicated tokio runtime. Task
//! bodies are blocking (they touch the database) and run on the runtime's
//! blocking pool. There is no retry and no cancellation. Tasks still pending
//! when the scheduler is dropped are lost; `UserService::purge_expired`
//! sweeps up what they would have removed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::{Builder, Runtime};

use crate::domain::result::{Error, Result};
use crate::services::logging::{LogEvent, LoggingService};

pub struct DelayedTaskScheduler {
    runtime: Runtime,
    pending: Arc<AtomicUsize>,
    logger: Arc<LoggingService>,
}

impl DelayedTaskScheduler {
    pub fn new(logger: Arc<LoggingService>) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("renohub-scheduler")
            .enable_time()
            .build()
            .map_err(|e| Error::Other(format!("Failed to start scheduler runtime: {}", e)))?;

        Ok(Self {
            runtime,
            pending: Arc::new(AtomicUsize::new(0)),
            logger,
        })
    }

    /// Run `task` once after `delay`
    ///
    /// A failing task is logged as `scheduled_task_failed` with its name.
    pub fn schedule<F>(&self, name: &'static str, delay: Duration, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let pending = Arc::clone(&self.pending);
        let logger = Arc::clone(&self.logger);

        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let outcome = tokio::task::spawn_blocking(task).await;
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(join_error) => Some(format!("task panicked: {}", join_error)),
            };
            if let Some(message) = failure {
                logger.emit(
                    LogEvent::new("scheduled_task_failed")
                        .with_error(message)
                        .with_error_details(name),
                );
            }

            pending.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Tasks scheduled but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Block until every scheduled task has finished or `timeout` passes.
    /// Returns whether the scheduler went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }
}
