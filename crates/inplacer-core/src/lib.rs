//! Core types and traits for inplacer.
//!
//! This crate provides the data model shared by every stage of a run:
//! configuration, the pluggable [`Transformer`] seam, per-task results and
//! log events, and the run-wide statistics owned by the aggregator.

mod config;
mod error;
mod event;
mod outcome;
mod params;
mod stats;
mod transform;

pub use config::{EngineConfig, EngineConfigBuilder, DEFAULT_TASK_TIMEOUT};
pub use error::{EngineError, LedgerError, TransformError};
pub use event::{Destination, LogEvent, MessageKey, Severity};
pub use outcome::{FailureKind, Outcome, TaskFailure, TaskStatus, TransformResult};
pub use params::{LargeFilePolicy, TransformParams};
pub use stats::{RunStatistics, reduction_percent};
pub use transform::{Transformer, ledger_file_name_for, dir_log_file_name_for};

/// Suffix carried by every temporary output file.
///
/// Anything ending in this suffix is a leftover of an interrupted run and is
/// never picked up as a task.
pub const TEMP_SUFFIX: &str = ".inplacer_tmp";

/// Prefix shared by every ledger and directory log file name.
pub const STATE_FILE_PREFIX: &str = ".inplacer_";
