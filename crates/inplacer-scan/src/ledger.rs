//! Per-directory ledger of already-processed files.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use compact_str::CompactString;
use dashmap::DashSet;
use tracing::{debug, warn};

use inplacer_core::LedgerError;

const BOM: char = '\u{feff}';

/// Persisted set of original file names already replaced in one directory.
///
/// Membership checks go straight to a concurrent set. Appends take the
/// handle lock, write one full line, and only then extend the set, so the
/// set never claims a name the log does not hold.
///
/// The ledger also tracks which output names tasks of the current run have
/// taken, so two sources converging on one destination cannot overwrite each
/// other. Claims are never persisted.
#[derive(Debug)]
pub struct DirectoryLedger {
    directory: PathBuf,
    log_path: PathBuf,
    entries: DashSet<CompactString>,
    claims: DashSet<CompactString>,
    writer: Mutex<Option<File>>,
}

impl DirectoryLedger {
    /// Create a ledger with no recorded entries. Nothing is read or created on disk.
    pub fn empty(directory: impl Into<PathBuf>, file_name: &str) -> Self {
        let directory = directory.into();
        let log_path = directory.join(file_name);
        Self {
            directory,
            log_path,
            entries: DashSet::new(),
            claims: DashSet::new(),
            writer: Mutex::new(None),
        }
    }

    /// Load a ledger, seeding it from the persisted log if one exists.
    ///
    /// A missing log is an empty ledger. Any other read failure is returned so
    /// the caller can decide to fall back to [`DirectoryLedger::empty`].
    pub fn load(directory: impl Into<PathBuf>, file_name: &str) -> std::io::Result<Self> {
        let ledger = Self::empty(directory, file_name);

        let bytes = match std::fs::read(&ledger.log_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ledger),
            Err(e) => return Err(e),
        };

        let text = String::from_utf8_lossy(&bytes);
        for name in parse_entries(&text) {
            ledger.entries.insert(CompactString::new(name));
        }

        debug!(
            path = %ledger.log_path.display(),
            count = ledger.entries.len(),
            "Loaded ledger"
        );
        Ok(ledger)
    }

    /// Whether `name` has already been recorded.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    /// Reserve output file name `name` for the calling task.
    ///
    /// Returns `false` when another task of this run already holds it.
    pub fn claim_output(&self, name: &str) -> bool {
        self.claims.insert(CompactString::new(name))
    }

    /// Persist `name` and add it to the set.
    ///
    /// Concurrent calls are serialized; each writes exactly one complete line.
    /// An empty name is ignored with a warning.
    pub fn record(&self, name: &str) -> Result<(), LedgerError> {
        if name.is_empty() {
            warn!(path = %self.log_path.display(), "Ignoring empty ledger entry");
            return Ok(());
        }

        let mut guard = self.writer.lock().map_err(|_| LedgerError::Poisoned {
            path: self.log_path.clone(),
        })?;

        let file = match &mut *guard {
            Some(file) => file,
            slot => slot.insert(self.open_log()?),
        };

        let mut line = String::with_capacity(name.len() + 1);
        line.push_str(name);
        line.push('\n');

        let written = file
            .write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .and_then(|()| file.sync_data());

        if let Err(source) = written {
            // Reopen on the next attempt instead of reusing a handle in an unknown state.
            *guard = None;
            return Err(LedgerError::Append {
                path: self.log_path.clone(),
                name: name.to_string(),
                source,
            });
        }

        self.entries.insert(CompactString::new(name));
        Ok(())
    }

    fn open_log(&self) -> Result<File, LedgerError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|source| LedgerError::Open {
                path: self.log_path.clone(),
                source,
            })
    }

    /// Directory this ledger belongs to.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the persisted log.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// File name of the persisted log.
    pub fn file_name(&self) -> String {
        self.log_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Number of recorded names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Names in a persisted log. Tolerates a leading byte-order mark and skips blank lines.
fn parse_entries(text: &str) -> impl Iterator<Item = &str> {
    text.strip_prefix(BOM)
        .unwrap_or(text)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
}
