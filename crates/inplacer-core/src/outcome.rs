//! Per-task results handed from workers to the aggregator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::event::LogEvent;

/// Coarse status of a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Success,
    Skipped,
    Error,
}

/// Where the replace protocol stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The source file could not be stat'ed. Nothing was touched.
    SizeCheck,
    /// Another source of this run already produces the same destination.
    /// Nothing was touched.
    DestinationClaimed,
    /// The external transform failed. Temp output was discarded.
    Transform,
    /// The temp output was missing or empty. Temp output was discarded.
    InvalidOutput,
    /// The original could not be removed. Temp output is kept on disk.
    OriginalNotRemoved,
    /// A pre-existing destination could not be removed after the original was deleted.
    DestinationBlocked,
    /// The final rename failed after the original was deleted.
    RenameFailed,
    /// The unit did not return within the task timeout.
    Timeout,
    /// The unit panicked.
    Panicked,
}

impl FailureKind {
    /// Critical failures leave the tree in a state that needs manual repair.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::DestinationBlocked | Self::RenameFailed)
    }
}

/// Details of a failed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub detail: String,
    pub original_size: Option<u64>,
    pub output_size: Option<u64>,
}

impl TaskFailure {
    /// Create a failure with no size information.
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            original_size: None,
            output_size: None,
        }
    }

    /// Attach the sizes known at the time of failure.
    pub fn with_sizes(mut self, original: Option<u64>, output: Option<u64>) -> Self {
        self.original_size = original;
        self.output_size = output;
        self
    }
}

/// Terminal state of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// The file was replaced by the transform output.
    ///
    /// `ledger_warning` is set when the replacement completed but the ledger
    /// entry could not be written (degraded success).
    Succeeded {
        original_size: u64,
        output_size: u64,
        ledger_warning: Option<String>,
    },
    /// The file was already recorded in its ledger.
    Skipped,
    /// The task failed.
    Failed(TaskFailure),
}

/// Result of running one task, produced exactly once per task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformResult {
    /// Source file of the task.
    pub source: PathBuf,
    /// Directory that owns the source.
    pub directory: PathBuf,
    /// How the task ended.
    pub outcome: Outcome,
    /// Events generated while running, in order.
    pub events: Vec<LogEvent>,
}

impl TransformResult {
    pub fn new(source: PathBuf, directory: PathBuf, outcome: Outcome, events: Vec<LogEvent>) -> Self {
        Self {
            source,
            directory,
            outcome,
            events,
        }
    }

    pub fn status(&self) -> TaskStatus {
        match self.outcome {
            Outcome::Succeeded { .. } => TaskStatus::Success,
            Outcome::Skipped => TaskStatus::Skipped,
            Outcome::Failed(_) => TaskStatus::Error,
        }
    }

    pub fn original_size(&self) -> Option<u64> {
        match &self.outcome {
            Outcome::Succeeded { original_size, .. } => Some(*original_size),
            Outcome::Skipped => None,
            Outcome::Failed(failure) => failure.original_size,
        }
    }

    pub fn output_size(&self) -> Option<u64> {
        match &self.outcome {
            Outcome::Succeeded { output_size, .. } => Some(*output_size),
            Outcome::Skipped => None,
            Outcome::Failed(failure) => failure.output_size,
        }
    }

    /// Error detail for failures, or the ledger warning of a degraded success.
    pub fn error_detail(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Succeeded { ledger_warning, .. } => ledger_warning.as_deref(),
            Outcome::Skipped => None,
            Outcome::Failed(failure) => Some(&failure.detail),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            Outcome::Failed(failure) => Some(failure.kind),
            _ => None,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.failure_kind().is_some_and(|k| k.is_critical())
    }

    pub fn is_degraded(&self) -> bool {
        matches!(
            self.outcome,
            Outcome::Succeeded {
                ledger_warning: Some(_),
                ..
            }
        )
    }
}
