//! The produce, verify, swap and record protocol for a single file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use inplacer_core::{
    FailureKind, LogEvent, MessageKey, Outcome, Severity, TaskFailure, TransformResult,
    Transformer, reduction_percent,
};
use inplacer_scan::Task;

use crate::fs::{Filesystem, StdFilesystem};
use crate::temp::temp_path_for;

/// Runs one task through the replace protocol.
///
/// The unit holds no per-task state; the only shared thing it touches is the
/// task's ledger, which also arbitrates destinations that several sources
/// would map to.
pub struct TransformUnit {
    transformer: Arc<dyn Transformer>,
    fs: Arc<dyn Filesystem>,
}

impl TransformUnit {
    /// Create a unit backed by the real filesystem.
    pub fn new(transformer: Arc<dyn Transformer>) -> Self {
        Self {
            transformer,
            fs: Arc::new(StdFilesystem),
        }
    }

    /// Replace the filesystem used for probing, removal and renames.
    pub fn with_filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = fs;
        self
    }

    /// The wrapped transformer.
    pub fn transformer(&self) -> &dyn Transformer {
        self.transformer.as_ref()
    }

    /// Final path of the output for `source`.
    pub fn destination_for(&self, source: &Path) -> PathBuf {
        let Some(output_ext) = self.transformer.output_extension() else {
            return source.to_path_buf();
        };
        let output_ext = output_ext.trim_start_matches('.');
        let same = source
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(output_ext));
        if same {
            source.to_path_buf()
        } else {
            source.with_extension(output_ext)
        }
    }

    /// Execute `task`. Never panics on I/O failure; every failure is in the result.
    pub fn execute(&self, task: &Task) -> TransformResult {
        let mut events = Vec::new();
        let outcome = self.run(task, &mut events);
        TransformResult::new(
            task.source().to_path_buf(),
            task.directory().to_path_buf(),
            outcome,
            events,
        )
    }

    fn run(&self, task: &Task, events: &mut Vec<LogEvent>) -> Outcome {
        let source = task.source();
        let dir = task.directory();
        let name = task.file_name();

        if task.ledger().contains(name) {
            events.push(
                LogEvent::new(Severity::Debug, MessageKey::SkipProcessed, dir)
                    .with("filename", name)
                    .with("ledger", task.ledger().file_name()),
            );
            return Outcome::Skipped;
        }

        let destination = self.destination_for(source);
        if destination != source {
            let output_name = destination
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if !task.ledger().claim_output(&output_name) {
                events.push(
                    LogEvent::new(Severity::Error, MessageKey::DestinationClaimed, dir)
                        .with("filename", name)
                        .with_path("destination", &destination)
                        .for_directory_log(),
                );
                return Outcome::Failed(TaskFailure::new(
                    FailureKind::DestinationClaimed,
                    format!(
                        "{} is already the output of another file in this run, {} was left untouched",
                        destination.display(),
                        source.display()
                    ),
                ));
            }
        }

        events.push(
            LogEvent::new(Severity::Info, MessageKey::TaskStart, dir)
                .with("filename", name)
                .with_path("destination", &destination)
                .for_directory_log(),
        );

        let original_size = match self.fs.file_size(source) {
            Ok(size) => size,
            Err(e) => {
                events.push(
                    LogEvent::new(Severity::Error, MessageKey::SizeCheckFailed, dir)
                        .with("filename", name)
                        .with("error", &e)
                        .for_directory_log(),
                );
                return Outcome::Failed(TaskFailure::new(
                    FailureKind::SizeCheck,
                    format!("Cannot read size of {}: {e}", source.display()),
                ));
            }
        };
        events.push(
            LogEvent::new(Severity::Info, MessageKey::OriginalSize, dir)
                .with("filename", name)
                .with("size_bytes", original_size)
                .for_directory_log(),
        );

        let params = task.params();
        let temp = temp_path_for(&destination);
        events.push(
            LogEvent::new(Severity::Debug, MessageKey::TransformOptions, dir)
                .with("filename", name)
                .with("mode", self.transformer.name())
                .with("quality", params.quality_for(original_size))
                .with("lossless", params.lossless)
                .with("optimize", params.optimize),
        );
        if let Some(note) = self.transformer.describe(source, params) {
            events.push(LogEvent::raw(Severity::Info, dir, note).for_directory_log());
        }

        if let Err(e) = self.transformer.transform(source, &temp, params) {
            events.push(
                LogEvent::new(Severity::Error, MessageKey::TransformFailed, dir)
                    .with("filename", name)
                    .with("error", &e)
                    .for_directory_log(),
            );
            self.discard_temp(&temp, dir, events);
            return Outcome::Failed(
                TaskFailure::new(
                    FailureKind::Transform,
                    format!("Transform of {} failed: {e}", source.display()),
                )
                .with_sizes(Some(original_size), None),
            );
        }

        let output_size = match self.fs.file_size(&temp) {
            Ok(size) if size > 0 => size,
            other => {
                let reason = if other.is_ok() { "empty" } else { "missing" };
                events.push(
                    LogEvent::new(Severity::Error, MessageKey::TempInvalid, dir)
                        .with("filename", name)
                        .with_path("temp", &temp)
                        .with("reason", reason)
                        .for_directory_log(),
                );
                self.discard_temp(&temp, dir, events);
                return Outcome::Failed(
                    TaskFailure::new(
                        FailureKind::InvalidOutput,
                        format!(
                            "Transform output {} for {} is {reason}",
                            temp.display(),
                            source.display()
                        ),
                    )
                    .with_sizes(Some(original_size), None),
                );
            }
        };

        // From here on the temp file is valid output and is never deleted.
        if let Err(e) = self.fs.remove_file(source) {
            events.push(
                LogEvent::new(Severity::Error, MessageKey::RemoveOriginalFailed, dir)
                    .with("filename", name)
                    .with("error", &e)
                    .with_path("temp", &temp)
                    .for_directory_log(),
            );
            return Outcome::Failed(
                TaskFailure::new(
                    FailureKind::OriginalNotRemoved,
                    format!(
                        "Cannot remove original {}: {e}. Transformed output was kept at {}",
                        source.display(),
                        temp.display()
                    ),
                )
                .with_sizes(Some(original_size), Some(output_size)),
            );
        }

        if destination != source && self.fs.exists(&destination) {
            events.push(
                LogEvent::new(Severity::Warning, MessageKey::OverwriteExisting, dir)
                    .with_path("destination", &destination)
                    .for_directory_log(),
            );
            // Already gone counts as removed.
            let removed = match self.fs.remove_file(&destination) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            };
            if let Err(e) = removed {
                events.push(
                    LogEvent::new(Severity::Critical, MessageKey::DestinationBlocked, dir)
                        .with_path("temp", &temp)
                        .with_path("destination", &destination)
                        .with("error", &e)
                        .for_directory_log(),
                );
                return Outcome::Failed(
                    TaskFailure::new(
                        FailureKind::DestinationBlocked,
                        format!(
                            "Original {} was removed but existing {} could not be removed: {e}. \
                             Manual intervention required: transformed output is at {}",
                            source.display(),
                            destination.display(),
                            temp.display()
                        ),
                    )
                    .with_sizes(Some(original_size), Some(output_size)),
                );
            }
        }

        if let Err(e) = self.fs.rename(&temp, &destination) {
            events.push(
                LogEvent::new(Severity::Critical, MessageKey::RenameFailed, dir)
                    .with_path("temp", &temp)
                    .with_path("destination", &destination)
                    .with("error", &e)
                    .for_directory_log(),
            );
            return Outcome::Failed(
                TaskFailure::new(
                    FailureKind::RenameFailed,
                    format!(
                        "Original {} was removed but {} could not be renamed to {}: {e}. \
                         Manual intervention required: rename the temporary file by hand",
                        source.display(),
                        temp.display(),
                        destination.display()
                    ),
                )
                .with_sizes(Some(original_size), Some(output_size)),
            );
        }

        events.push(
            LogEvent::new(Severity::Info, MessageKey::Replaced, dir)
                .with("filename", name)
                .with_path("destination", &destination)
                .with("original_bytes", original_size)
                .with("output_bytes", output_size)
                .with(
                    "percent",
                    format!("{:.1}", reduction_percent(original_size, output_size)),
                )
                .for_directory_log(),
        );

        let ledger_warning = match task.ledger().record(name) {
            Ok(()) => None,
            Err(e) => {
                events.push(
                    LogEvent::new(Severity::Error, MessageKey::LedgerWriteFailed, dir)
                        .with("filename", name)
                        .with("ledger", task.ledger().file_name())
                        .with("error", &e)
                        .for_directory_log(),
                );
                Some(format!(
                    "{} was replaced but could not be recorded: {e}",
                    source.display()
                ))
            }
        };

        Outcome::Succeeded {
            original_size,
            output_size,
            ledger_warning,
        }
    }

    /// Best-effort removal of a temp file that does not hold valid output.
    fn discard_temp(&self, temp: &Path, dir: &Path, events: &mut Vec<LogEvent>) {
        if !self.fs.exists(temp) {
            return;
        }
        if let Err(e) = self.fs.remove_file(temp) {
            events.push(
                LogEvent::new(Severity::Warning, MessageKey::TempCleanupFailed, dir)
                    .with_path("temp", temp)
                    .with("error", &e),
            );
        }
    }
}
