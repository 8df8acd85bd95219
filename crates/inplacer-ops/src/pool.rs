//! Bounded worker pool with per-task timeout and cooperative cancellation.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use inplacer_core::{
    EngineError, FailureKind, LogEvent, MessageKey, Outcome, Severity, TaskFailure,
    TransformResult,
};
use inplacer_scan::Task;

use crate::unit::TransformUnit;

/// Summary of one pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolReport {
    /// Tasks handed to a worker.
    pub submitted: u64,
    /// Tasks whose result reached the result channel.
    pub completed: u64,
    /// Whether dispatching stopped because of cancellation.
    pub cancelled: bool,
}

/// Runs tasks through a [`TransformUnit`] with at most `workers` in flight.
///
/// Units run on the blocking thread pool. A unit that exceeds the task
/// timeout is abandoned: its slot is released and a timeout result is
/// reported, while the thread itself runs to completion in the background.
///
/// `workers` therefore bounds the units the pool is waiting on, not the
/// units executing: each abandoned unit that is still running adds one more
/// busy thread until it returns. A late-finishing unit may still complete its
/// swap and ledger record; only its result is discarded.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    task_timeout: Duration,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(workers: usize, task_timeout: Duration) -> Self {
        Self {
            workers: workers.max(1),
            task_timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execute every task produced by `source` and send each result to `results`.
    ///
    /// `source` is called on a blocking thread, so it may walk the filesystem.
    /// On cancellation no further task is started; tasks already running are
    /// awaited before this returns.
    pub async fn run<S, I>(
        &self,
        source: S,
        unit: Arc<TransformUnit>,
        results: mpsc::Sender<TransformResult>,
    ) -> Result<PoolReport, EngineError>
    where
        S: FnOnce() -> I + Send + 'static,
        I: IntoIterator<Item = Task>,
    {
        let (task_tx, mut task_rx) = mpsc::channel::<Task>(self.workers * 2);
        let feeder_cancel = self.cancel.clone();
        let feeder = tokio::task::spawn_blocking(move || {
            let mut fed = 0u64;
            for task in source() {
                if feeder_cancel.is_cancelled() || task_tx.blocking_send(task).is_err() {
                    break;
                }
                fed += 1;
            }
            fed
        });

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut running = JoinSet::new();
        let mut report = PoolReport::default();

        info!(
            workers = self.workers,
            timeout_secs = self.task_timeout.as_secs(),
            "Starting worker pool"
        );

        loop {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    permit.map_err(|_| EngineError::pool("worker semaphore closed"))?
                }
            };

            let task = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                task = task_rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            report.submitted += 1;
            let unit = Arc::clone(&unit);
            let results = results.clone();
            let timeout = self.task_timeout;
            running.spawn(async move {
                let result = execute_with_timeout(unit, task, timeout).await;
                drop(permit);
                results.send(result).await.is_ok()
            });

            while let Some(joined) = running.try_join_next() {
                reap(joined, &mut report);
            }
        }

        // Unblocks the feeder if it is waiting on a full channel.
        drop(task_rx);

        if report.cancelled {
            info!(in_flight = running.len(), "Cancelled, draining in-flight tasks");
        }
        while let Some(joined) = running.join_next().await {
            reap(joined, &mut report);
        }

        let fed = feeder
            .await
            .map_err(|e| EngineError::pool(format!("task feeder failed: {e}")))?;
        debug!(
            fed,
            submitted = report.submitted,
            completed = report.completed,
            "Worker pool finished"
        );

        Ok(report)
    }
}

fn reap(joined: Result<bool, tokio::task::JoinError>, report: &mut PoolReport) {
    match joined {
        Ok(true) => report.completed += 1,
        Ok(false) => warn!("Result channel closed, dropping result"),
        Err(e) => warn!(error = %e, "Worker task failed"),
    }
}

async fn execute_with_timeout(
    unit: Arc<TransformUnit>,
    task: Task,
    timeout: Duration,
) -> TransformResult {
    let source = task.source().to_path_buf();
    let directory = task.directory().to_path_buf();
    let file_name = task.file_name().to_string();

    let handle = tokio::task::spawn_blocking(move || unit.execute(&task));

    let (kind, detail, event) = match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => return result,
        Ok(Err(e)) => (
            FailureKind::Panicked,
            format!("Processing {file_name} panicked: {e}"),
            LogEvent::new(Severity::Error, MessageKey::TaskPanicked, &directory)
                .with("filename", &file_name)
                .with("error", &e),
        ),
        Err(_) => (
            FailureKind::Timeout,
            format!(
                "Processing {file_name} did not finish within {}s",
                timeout.as_secs()
            ),
            LogEvent::new(Severity::Error, MessageKey::TaskTimeout, &directory)
                .with("filename", &file_name)
                .with("seconds", timeout.as_secs()),
        ),
    };

    TransformResult::new(
        source,
        directory,
        Outcome::Failed(TaskFailure::new(kind, detail)),
        vec![event.for_directory_log()],
    )
}
