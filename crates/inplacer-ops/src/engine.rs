//! Wires collector, pool and aggregator into one run.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use inplacer_core::{EngineConfig, EngineError, RunStatistics, TransformParams, Transformer};
use inplacer_scan::{EligibilityRules, TaskCollector};

use crate::RESULT_CHANNEL_SIZE;
use crate::aggregator::{ManualRepair, ResultAggregator};
use crate::fs::Filesystem;
use crate::pool::WorkerPool;
use crate::render::EventRenderer;
use crate::unit::TransformUnit;

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Final counters.
    pub statistics: RunStatistics,
    /// Name of the transform that ran.
    pub mode: String,
    /// Canonical root directory.
    pub root: String,
    /// Tasks started by the pool.
    pub submitted: u64,
    /// Directories that held at least one eligible file.
    pub directories_scanned: u64,
    /// Directory entries the walk could not read.
    pub walk_errors: u64,
    /// Ledgers that could not be read and were treated as empty.
    pub ledger_warnings: u64,
    /// Directory log lines that could not be written.
    pub dir_log_failures: u64,
    /// Files left needing manual intervention.
    pub manual_repairs: Vec<ManualRepair>,
    /// Whether the run stopped early on cancellation.
    pub interrupted: bool,
    /// Wall-clock duration of the run.
    pub elapsed_secs: f64,
    /// Per-directory ledger file name.
    pub ledger_file_name: String,
    /// Per-directory log file name.
    pub dir_log_file_name: String,
    /// Run-wide debug log, when the binary keeps one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_log: Option<String>,
}

impl RunReport {
    /// Whether any failure needs manual repair.
    pub fn has_critical_errors(&self) -> bool {
        self.statistics.critical_count > 0
    }
}

/// A configured transform run over one directory tree.
pub struct Engine {
    config: EngineConfig,
    transformer: Arc<dyn Transformer>,
    params: TransformParams,
    fs: Option<Arc<dyn Filesystem>>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        transformer: Arc<dyn Transformer>,
        params: TransformParams,
    ) -> Self {
        Self {
            config,
            transformer,
            params,
            fs: None,
        }
    }

    /// Run the replace protocol against a custom filesystem.
    pub fn with_filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Process the tree until every task is done or `cancel` fires.
    ///
    /// Only run-level problems (bad root, bad parameters, scheduling failure)
    /// are returned as errors. Per-file failures end up in the statistics.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport, EngineError> {
        let started = Instant::now();

        self.params
            .validate()
            .map_err(|message| EngineError::InvalidConfig { message })?;

        let rules = EligibilityRules::for_transformer(&self.config, self.transformer.as_ref());
        let ledger_file_name = rules.ledger_file_name.clone();
        let dir_log_file_name = rules.dir_log_file_name.clone();
        let collector = TaskCollector::new(&self.config, rules, self.params.clone())?;
        let root = collector.root().display().to_string();
        let walk = collector.walk_stats();

        let mut unit = TransformUnit::new(Arc::clone(&self.transformer));
        if let Some(fs) = &self.fs {
            unit = unit.with_filesystem(Arc::clone(fs));
        }
        let unit = Arc::new(unit);

        let pool = WorkerPool::new(self.config.effective_workers(), self.config.task_timeout())
            .with_cancellation(cancel);

        info!(
            root = %root,
            mode = self.transformer.name(),
            workers = pool.workers(),
            "Starting run"
        );

        let (result_tx, result_rx) = mpsc::channel(RESULT_CHANNEL_SIZE);
        let aggregator = ResultAggregator::new(EventRenderer::new(), dir_log_file_name.clone());
        let aggregation = tokio::task::spawn_blocking(move || aggregator.run_blocking(result_rx));

        let pool_result = pool.run(move || collector.tasks(), unit, result_tx).await;

        // The pool has dropped its sender by now, so aggregation terminates.
        let aggregator = aggregation
            .await
            .map_err(|e| EngineError::pool(format!("result aggregator failed: {e}")))?;
        let pool_report = pool_result?;

        let aggregate = aggregator.finish();
        let statistics = aggregate.statistics;
        let elapsed_secs = started.elapsed().as_secs_f64();

        info!(
            processed = statistics.processed_count,
            skipped = statistics.skipped_count,
            errors = statistics.error_count,
            critical = statistics.critical_count,
            walk_errors = walk.walk_errors(),
            elapsed_secs,
            "Run finished"
        );

        Ok(RunReport {
            statistics,
            mode: self.transformer.name().to_string(),
            root,
            submitted: pool_report.submitted,
            directories_scanned: walk.directories(),
            walk_errors: walk.walk_errors(),
            ledger_warnings: walk.ledger_warnings(),
            dir_log_failures: aggregate.dir_log_failures,
            manual_repairs: aggregate.manual_repairs,
            interrupted: pool_report.cancelled,
            elapsed_secs,
            ledger_file_name,
            dir_log_file_name,
            global_log: None,
        })
    }
}
