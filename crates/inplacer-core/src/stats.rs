//! Run-wide statistics.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::outcome::{Outcome, TransformResult};

/// Size reduction in percent. Zero when `original` is zero.
///
/// Negative when the output grew.
pub fn reduction_percent(original: u64, output: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - output as f64) * 100.0 / original as f64
}

/// Counters for a whole run.
///
/// Only the aggregator mutates these; everyone else sees snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Files replaced by their transform output (degraded successes included).
    pub processed_count: u64,
    /// Files skipped because their ledger already recorded them.
    pub skipped_count: u64,
    /// Files that failed.
    pub error_count: u64,
    /// Failures that need manual repair (subset of `error_count`).
    pub critical_count: u64,
    /// Successes whose ledger entry could not be written (subset of `processed_count`).
    pub degraded_count: u64,
    /// Bytes of inputs whose size was read.
    pub total_input_bytes: u64,
    /// Bytes of outputs produced, including outputs orphaned by failures.
    pub total_output_bytes: u64,
    /// Directories in which at least one file was processed.
    pub directories_touched: BTreeSet<PathBuf>,
}

impl RunStatistics {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one task result into the counters.
    pub fn record(&mut self, result: &TransformResult) {
        match &result.outcome {
            Outcome::Succeeded {
                original_size,
                output_size,
                ..
            } => {
                self.processed_count += 1;
                self.total_input_bytes += original_size;
                self.total_output_bytes += output_size;
                if result.is_degraded() {
                    self.degraded_count += 1;
                }
                self.directories_touched.insert(result.directory.clone());
            }
            Outcome::Skipped => {
                self.skipped_count += 1;
            }
            Outcome::Failed(failure) => {
                self.error_count += 1;
                if failure.kind.is_critical() {
                    self.critical_count += 1;
                }
                if let Some(size) = failure.original_size {
                    self.total_input_bytes += size;
                }
                if let Some(size) = failure.output_size {
                    self.total_output_bytes += size;
                }
            }
        }
    }

    /// Total number of results folded in.
    pub fn total_tasks(&self) -> u64 {
        self.processed_count + self.skipped_count + self.error_count
    }

    /// Number of distinct directories touched.
    pub fn distinct_directories(&self) -> usize {
        self.directories_touched.len()
    }

    /// Overall reduction, or `None` when no input bytes were seen.
    pub fn reduction_percent(&self) -> Option<f64> {
        (self.total_input_bytes > 0)
            .then(|| reduction_percent(self.total_input_bytes, self.total_output_bytes))
    }
}
