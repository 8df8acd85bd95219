//! Filesystem primitives used by the replace protocol.

use std::fs;
use std::io;
use std::path::Path;

/// The handful of filesystem calls the replace protocol makes.
///
/// Production code uses [`StdFilesystem`]; tests substitute implementations
/// that fail at a chosen step.
pub trait Filesystem: Send + Sync {
    /// Size of a regular file. Fails for anything that is not a regular file.
    fn file_size(&self, path: &Path) -> io::Result<u64>;

    /// Whether anything exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Remove a file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Rename `from` to `to` within one directory.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFilesystem;

impl Filesystem for StdFilesystem {
    fn file_size(&self, path: &Path) -> io::Result<u64> {
        let metadata = fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            ));
        }
        Ok(metadata.len())
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}
