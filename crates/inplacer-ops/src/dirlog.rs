//! Per-directory human-readable log files.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use inplacer_core::Severity;

/// Appends timestamped lines to a log file inside each processed directory.
///
/// Only the aggregator writes through this, so no locking is needed.
#[derive(Debug, Clone)]
pub struct DirectoryLog {
    file_name: String,
}

impl DirectoryLog {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Log file name used in every directory.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Path of the log for `directory`.
    pub fn path_for(&self, directory: &Path) -> PathBuf {
        directory.join(&self.file_name)
    }

    /// Append one line, creating the file if needed.
    pub fn append(&self, directory: &Path, severity: Severity, message: &str) -> io::Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let line = format_line(&timestamp, severity, message);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(directory))?;
        file.write_all(line.as_bytes())
    }
}

fn format_line(timestamp: &str, severity: Severity, message: &str) -> String {
    let message = message.replace(['\r', '\n'], " ");
    format!("{timestamp} - {severity} - {message}\n")
}
