//! JWalk-based task collector.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use jwalk::{DirEntryIter, Parallelism, WalkDir};
use tracing::{debug, warn};

use inplacer_core::{
    EngineConfig, EngineError, STATE_FILE_PREFIX, TEMP_SUFFIX, TransformParams, Transformer,
    dir_log_file_name_for, ledger_file_name_for,
};

use crate::ledger::DirectoryLedger;
use crate::task::Task;

/// Which files become tasks.
#[derive(Debug, Clone)]
pub struct EligibilityRules {
    /// Accepted extensions, lower-case without dot.
    pub extensions: Vec<String>,
    /// Output extension of a format-changing transform.
    pub output_extension: Option<String>,
    /// Ledger file name used in every directory.
    pub ledger_file_name: String,
    /// Directory log file name used in every directory.
    pub dir_log_file_name: String,
}

impl EligibilityRules {
    /// Rules for `transformer`, with config overrides applied.
    pub fn for_transformer(config: &EngineConfig, transformer: &dyn Transformer) -> Self {
        let overrides = config.normalized_extensions();
        let extensions = if overrides.is_empty() {
            transformer
                .supported_extensions()
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect()
        } else {
            overrides
        };

        Self {
            extensions,
            output_extension: transformer
                .output_extension()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase()),
            ledger_file_name: config
                .ledger_file_name
                .clone()
                .unwrap_or_else(|| ledger_file_name_for(transformer.name())),
            dir_log_file_name: config
                .dir_log_file_name
                .clone()
                .unwrap_or_else(|| dir_log_file_name_for(transformer.name())),
        }
    }

    /// Whether a regular file called `name` should be transformed.
    pub fn is_eligible(&self, name: &str) -> bool {
        if name.ends_with(TEMP_SUFFIX)
            || name.starts_with(STATE_FILE_PREFIX)
            || name == self.ledger_file_name
            || name == self.dir_log_file_name
        {
            return false;
        }

        let Some(ext) = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
        else {
            return false;
        };

        if self.output_extension.as_deref() == Some(ext.as_str()) {
            return false;
        }

        self.extensions.iter().any(|e| *e == ext)
    }
}

/// Counters updated while a walk runs. Readable from any thread.
#[derive(Debug, Default)]
pub struct WalkStats {
    directories: AtomicU64,
    walk_errors: AtomicU64,
    ledger_warnings: AtomicU64,
}

impl WalkStats {
    /// Directories that produced at least one task.
    pub fn directories(&self) -> u64 {
        self.directories.load(Ordering::Relaxed)
    }

    /// Entries the walker could not read.
    pub fn walk_errors(&self) -> u64 {
        self.walk_errors.load(Ordering::Relaxed)
    }

    /// Ledgers that could not be read and were treated as empty.
    pub fn ledger_warnings(&self) -> u64 {
        self.ledger_warnings.load(Ordering::Relaxed)
    }
}

/// Walks a tree once and yields one [`Task`] per eligible file.
#[derive(Debug, Clone)]
pub struct TaskCollector {
    root: PathBuf,
    follow_symlinks: bool,
    include_hidden: bool,
    rules: EligibilityRules,
    params: Arc<TransformParams>,
    stats: Arc<WalkStats>,
}

impl TaskCollector {
    /// Create a collector. Fails if the root is missing or not a directory.
    pub fn new(
        config: &EngineConfig,
        rules: EligibilityRules,
        params: TransformParams,
    ) -> Result<Self, EngineError> {
        let root = config
            .root
            .canonicalize()
            .map_err(|e| EngineError::io(&config.root, e))?;

        if !root.is_dir() {
            return Err(EngineError::NotADirectory { path: root });
        }

        Ok(Self {
            root,
            follow_symlinks: config.follow_symlinks,
            include_hidden: config.include_hidden,
            rules,
            params: Arc::new(params),
            stats: Arc::new(WalkStats::default()),
        })
    }

    /// Canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Eligibility rules in effect.
    pub fn rules(&self) -> &EligibilityRules {
        &self.rules
    }

    /// Counters shared with every walk started by this collector.
    pub fn walk_stats(&self) -> Arc<WalkStats> {
        Arc::clone(&self.stats)
    }

    /// Start the walk. Tasks are produced lazily as the iterator is driven.
    pub fn tasks(&self) -> Tasks {
        let walker = WalkDir::new(&self.root)
            .parallelism(Parallelism::RayonDefaultPool {
                busy_timeout: std::time::Duration::from_millis(100),
            })
            .skip_hidden(!self.include_hidden)
            .follow_links(self.follow_symlinks)
            .sort(true);

        Tasks {
            walker: walker.into_iter(),
            ledgers: HashMap::new(),
            rules: self.rules.clone(),
            params: Arc::clone(&self.params),
            stats: Arc::clone(&self.stats),
        }
    }
}

/// Lazy task sequence produced by [`TaskCollector::tasks`].
pub struct Tasks {
    walker: DirEntryIter<((), ())>,
    ledgers: HashMap<PathBuf, Arc<DirectoryLedger>>,
    rules: EligibilityRules,
    params: Arc<TransformParams>,
    stats: Arc<WalkStats>,
}

impl Tasks {
    fn ledger_for(&mut self, directory: &Path) -> Arc<DirectoryLedger> {
        if let Some(ledger) = self.ledgers.get(directory) {
            return Arc::clone(ledger);
        }

        let ledger = match DirectoryLedger::load(directory, &self.rules.ledger_file_name) {
            Ok(ledger) => ledger,
            Err(e) => {
                self.stats.ledger_warnings.fetch_add(1, Ordering::Relaxed);
                warn!(
                    directory = %directory.display(),
                    error = %e,
                    "Cannot read ledger, treating directory as unprocessed"
                );
                DirectoryLedger::empty(directory, &self.rules.ledger_file_name)
            }
        };

        let ledger = Arc::new(ledger);
        self.stats.directories.fetch_add(1, Ordering::Relaxed);
        self.ledgers
            .insert(directory.to_path_buf(), Arc::clone(&ledger));
        ledger
    }
}

impl Iterator for Tasks {
    type Item = Task;

    fn next(&mut self) -> Option<Task> {
        loop {
            let entry = match self.walker.next() {
                Some(Ok(entry)) => entry,
                None => {
                    debug!(
                        directories = self.stats.directories(),
                        walk_errors = self.stats.walk_errors(),
                        ledger_warnings = self.stats.ledger_warnings(),
                        "Walk finished"
                    );
                    return None;
                }
                Some(Err(err)) => {
                    self.stats.walk_errors.fetch_add(1, Ordering::Relaxed);
                    let path = err.path().map(|p| p.display().to_string()).unwrap_or_default();
                    warn!(path = %path, error = %err, "Cannot read directory entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if !self.rules.is_eligible(&name) {
                continue;
            }

            let source = entry.path();
            let Some(directory) = source.parent().map(Path::to_path_buf) else {
                continue;
            };

            debug!(path = %source.display(), "Collected task");
            let ledger = self.ledger_for(&directory);
            return Some(Task::new(source, ledger, Arc::clone(&self.params)));
        }
    }
}
