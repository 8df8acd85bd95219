//! Unit of work handed to the worker pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use compact_str::CompactString;

use inplacer_core::TransformParams;

use crate::ledger::DirectoryLedger;

/// One eligible file, bound to the ledger of its directory.
///
/// Created once by the collector and consumed exactly once by a worker.
#[derive(Debug, Clone)]
pub struct Task {
    source: PathBuf,
    file_name: CompactString,
    ledger: Arc<DirectoryLedger>,
    params: Arc<TransformParams>,
}

impl Task {
    /// Create a task for `source`, which must live in `ledger`'s directory.
    pub fn new(source: PathBuf, ledger: Arc<DirectoryLedger>, params: Arc<TransformParams>) -> Self {
        let file_name = source
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_default();
        Self {
            source,
            file_name,
            ledger,
            params,
        }
    }

    /// Absolute path of the file to transform.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Directory containing the source.
    pub fn directory(&self) -> &Path {
        self.ledger.directory()
    }

    /// Original file name, as recorded in the ledger.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Ledger shared by every task of this directory.
    pub fn ledger(&self) -> &DirectoryLedger {
        &self.ledger
    }

    /// Shared ledger handle.
    pub fn ledger_handle(&self) -> &Arc<DirectoryLedger> {
        &self.ledger
    }

    /// Transform parameters.
    pub fn params(&self) -> &TransformParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_accessors() {
        let ledger = Arc::new(DirectoryLedger::empty("/photos", "done.txt"));
        let task = Task::new(
            PathBuf::from("/photos/cat.jpg"),
            Arc::clone(&ledger),
            Arc::new(TransformParams::default()),
        );

        assert_eq!(task.file_name(), "cat.jpg");
        assert_eq!(task.directory(), Path::new("/photos"));
        assert!(Arc::ptr_eq(task.ledger_handle(), &ledger));
    }
}
