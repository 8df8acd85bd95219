//! Error types for runs, ledgers and transforms.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole run.
///
/// Per-file problems are never reported through this type; they travel inside
/// a [`TransformResult`](crate::TransformResult) instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The worker pool could not schedule work.
    #[error("Worker pool failure: {message}")]
    Pool { message: String },
}

impl EngineError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a pool failure.
    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool {
            message: message.into(),
        }
    }
}

/// Failure to persist a ledger entry.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The persisted log could not be opened for appending.
    #[error("Cannot open ledger {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The append itself failed.
    #[error("Cannot append '{name}' to ledger {path}: {source}")]
    Append {
        path: PathBuf,
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Another thread panicked while holding the ledger lock.
    #[error("Ledger lock poisoned: {path}")]
    Poisoned { path: PathBuf },
}

/// Errors raised by a content transform.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The input format is not handled by this transformer.
    #[error("Unsupported input format: {message}")]
    Unsupported { message: String },

    /// The input could not be decoded (corrupt or unidentifiable content).
    #[error("Cannot decode input: {message}")]
    Decode { message: String },

    /// The output could not be encoded.
    #[error("Cannot encode output: {message}")]
    Encode { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransformError {
    /// Create an unsupported-format error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Whether the failure is about the content rather than the filesystem.
    pub fn is_content_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}
