//! Single consumer of task results.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use inplacer_core::{LogEvent, MessageKey, Outcome, RunStatistics, Severity, TransformResult};

use crate::dirlog::DirectoryLog;
use crate::render::EventRenderer;

/// A file left in a state that needs manual repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualRepair {
    pub source: PathBuf,
    pub detail: String,
}

/// Everything the aggregator collected over a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregate {
    pub statistics: RunStatistics,
    pub manual_repairs: Vec<ManualRepair>,
    /// Directory log lines that could not be written.
    pub dir_log_failures: u64,
}

/// Routes every result's events to the log sinks and folds it into the statistics.
///
/// This is the only place that writes to directory logs or mutates
/// [`RunStatistics`]; it runs on a single thread and owns both.
#[derive(Debug)]
pub struct ResultAggregator {
    renderer: EventRenderer,
    dir_log: DirectoryLog,
    stats: RunStatistics,
    processed_per_dir: BTreeMap<PathBuf, u64>,
    manual_repairs: Vec<ManualRepair>,
    dir_log_failures: u64,
}

impl ResultAggregator {
    pub fn new(renderer: EventRenderer, dir_log_file_name: impl Into<String>) -> Self {
        Self {
            renderer,
            dir_log: DirectoryLog::new(dir_log_file_name),
            stats: RunStatistics::new(),
            processed_per_dir: BTreeMap::new(),
            manual_repairs: Vec::new(),
            dir_log_failures: 0,
        }
    }

    /// Consume one result.
    pub fn absorb(&mut self, result: TransformResult) {
        for event in &result.events {
            self.emit(event);
        }

        match result.outcome {
            Outcome::Succeeded { .. } => {
                *self
                    .processed_per_dir
                    .entry(result.directory.clone())
                    .or_default() += 1;
            }
            Outcome::Failed(_) if result.is_critical() => {
                self.manual_repairs.push(ManualRepair {
                    source: result.source.clone(),
                    detail: result.error_detail().unwrap_or_default().to_string(),
                });
            }
            _ => {}
        }
        self.stats.record(&result);
    }

    /// Drain `results` until every sender is gone, then write per-directory summaries.
    ///
    /// Must run on a thread where blocking is allowed.
    pub fn run_blocking(mut self, mut results: mpsc::Receiver<TransformResult>) -> Self {
        while let Some(result) = results.blocking_recv() {
            self.absorb(result);
        }
        self.finish_directories();
        self
    }

    /// Write the "N files processed" line to every directory that had a success.
    pub fn finish_directories(&mut self) {
        let summaries: Vec<_> = self
            .processed_per_dir
            .iter()
            .map(|(dir, count)| {
                LogEvent::new(Severity::Info, MessageKey::DirectoryComplete, dir.as_path())
                    .with("count", count)
                    .for_directory_log()
            })
            .collect();
        for event in &summaries {
            self.emit(event);
        }
        self.processed_per_dir.clear();
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.stats
    }

    /// Directory log lines that could not be written.
    pub fn dir_log_failures(&self) -> u64 {
        self.dir_log_failures
    }

    /// Files that need manual repair, in arrival order.
    pub fn manual_repairs(&self) -> &[ManualRepair] {
        &self.manual_repairs
    }

    pub fn finish(self) -> Aggregate {
        Aggregate {
            statistics: self.stats,
            manual_repairs: self.manual_repairs,
            dir_log_failures: self.dir_log_failures,
        }
    }

    fn emit(&mut self, event: &LogEvent) {
        let message = self.renderer.render(event);
        let directory = event.directory.display();

        match event.severity {
            Severity::Debug => debug!(directory = %directory, "{message}"),
            Severity::Info => info!(directory = %directory, "{message}"),
            Severity::Warning => warn!(directory = %directory, "{message}"),
            Severity::Error => error!(directory = %directory, "{message}"),
            Severity::Critical => error!(directory = %directory, critical = true, "{message}"),
        }

        if !event.is_directory_event() {
            return;
        }
        if let Err(e) = self.dir_log.append(&event.directory, event.severity, &message) {
            self.dir_log_failures += 1;
            error!(
                path = %self.dir_log.path_for(&event.directory).display(),
                error = %e,
                "Cannot write directory log"
            );
        }
    }
}
