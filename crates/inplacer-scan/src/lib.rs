//! Task collection and per-directory ledgers for inplacer.
//!
//! # Overview
//!
//! `inplacer-scan` walks the target tree once and turns every eligible file
//! into a [`Task`]. Tasks of the same directory share one
//! [`DirectoryLedger`], the persisted record of files already replaced there,
//! which makes re-runs skip finished work.
//!
//! - **Parallel traversal** via jwalk
//! - **Lazy** task production, so dispatch starts before the walk ends
//! - **Fail-open** ledgers: an unreadable ledger is treated as empty
//!
//! # Example
//!
//! ```rust,no_run
//! use inplacer_core::{EngineConfig, TransformParams};
//! use inplacer_scan::{EligibilityRules, TaskCollector};
//!
//! let config = EngineConfig::new("/path/to/photos");
//! let rules = EligibilityRules {
//!     extensions: vec!["jpg".into(), "png".into()],
//!     output_extension: None,
//!     ledger_file_name: ".inplacer_recompress_done.txt".into(),
//!     dir_log_file_name: ".inplacer_recompress.log".into(),
//! };
//! let collector = TaskCollector::new(&config, rules, TransformParams::default()).unwrap();
//!
//! for task in collector.tasks() {
//!     println!("{}", task.source().display());
//! }
//! ```

mod collector;
mod ledger;
mod task;

pub use collector::{EligibilityRules, TaskCollector, Tasks, WalkStats};
pub use ledger::DirectoryLedger;
pub use task::Task;
