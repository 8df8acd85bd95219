//! Engine configuration types.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Default per-task wall-clock timeout.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for a transform run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Root directory to process.
    pub root: PathBuf,

    /// Maximum number of concurrently executing transform units (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub workers: usize,

    /// Per-task timeout in seconds.
    #[builder(default = "DEFAULT_TASK_TIMEOUT.as_secs()")]
    #[serde(default = "default_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Eligible extensions, overriding the transformer's own list when non-empty.
    #[builder(default)]
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Ledger file name, overriding the per-mode default.
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub ledger_file_name: Option<String>,

    /// Directory log file name, overriding the per-mode default.
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub dir_log_file_name: Option<String>,

    /// Follow symbolic links while walking.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TASK_TIMEOUT.as_secs()
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        if self.task_timeout_secs == Some(0) {
            return Err("Task timeout must be at least one second".to_string());
        }
        if let Some(Some(name)) = &self.ledger_file_name {
            if name.is_empty() || name.contains('/') {
                return Err(format!("Invalid ledger file name: '{name}'"));
            }
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Create a simple config for processing a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            workers: 0,
            task_timeout_secs: default_timeout_secs(),
            extensions: Vec::new(),
            ledger_file_name: None,
            dir_log_file_name: None,
            follow_symlinks: false,
            include_hidden: true,
        }
    }

    /// Worker count with auto-detection applied. Never less than one.
    pub fn effective_workers(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
        .max(1)
    }

    /// Per-task timeout.
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs.max(1))
    }

    /// Normalized extension override (lower-case, no leading dot).
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
