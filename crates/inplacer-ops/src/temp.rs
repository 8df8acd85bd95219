//! Temporary output naming.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use inplacer_core::TEMP_SUFFIX;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Temporary path next to `destination`.
///
/// The name embeds the process id, a millisecond timestamp and a
/// per-process sequence number, so concurrent workers and concurrent runs
/// never pick the same path.
pub fn temp_path_for(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);

    destination.with_file_name(format!(
        "{name}.{}-{millis}-{seq}{TEMP_SUFFIX}",
        std::process::id()
    ))
}
