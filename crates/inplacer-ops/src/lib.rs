//! Replace protocol, worker pool and result aggregation for inplacer.
//!
//! A run flows in one direction:
//!
//! 1. the [`TaskCollector`](inplacer_scan::TaskCollector) walks the tree and
//!    yields tasks lazily,
//! 2. the [`WorkerPool`] runs each task through a [`TransformUnit`] with a
//!    bounded number in flight,
//! 3. the [`ResultAggregator`] consumes every result on a single thread,
//!    writing logs and folding statistics.
//!
//! [`Engine`] wires these together.

mod aggregator;
mod dirlog;
mod engine;
mod fs;
mod pool;
mod render;
mod temp;
mod unit;

pub use aggregator::{Aggregate, ManualRepair, ResultAggregator};
pub use dirlog::DirectoryLog;
pub use engine::{Engine, RunReport};
pub use fs::{Filesystem, StdFilesystem};
pub use pool::{PoolReport, WorkerPool};
pub use render::EventRenderer;
pub use temp::temp_path_for;
pub use unit::TransformUnit;

/// Capacity of the channel between workers and the aggregator.
pub const RESULT_CHANNEL_SIZE: usize = 1024;
