//! Structured log events produced during task execution.
//!
//! Events carry data, not text. Rendering happens at the aggregator, which
//! is the only component that talks to the logging sinks.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Severity of a log event.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    /// Requires manual intervention.
    Critical,
}

/// Where an event should be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// Global sink only.
    Global,
    /// Global sink and the owning directory's log file.
    Directory,
}

/// Identifies the message an event renders to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKey {
    SkipProcessed,
    TaskStart,
    DestinationClaimed,
    OriginalSize,
    SizeCheckFailed,
    TransformOptions,
    TransformFailed,
    TempCleanupFailed,
    TempInvalid,
    RemoveOriginalFailed,
    OverwriteExisting,
    DestinationBlocked,
    RenameFailed,
    Replaced,
    LedgerWriteFailed,
    TaskTimeout,
    TaskPanicked,
    DirectoryComplete,
    /// Free text passed through the `message` parameter.
    Raw,
}

/// A single structured log event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Severity of the event.
    pub severity: Severity,
    /// Message to render.
    pub key: MessageKey,
    /// Named parameters, in insertion order.
    pub params: IndexMap<String, String>,
    /// Routing.
    pub destination: Destination,
    /// Directory the event belongs to.
    pub directory: PathBuf,
}

impl LogEvent {
    /// Create an event routed to the global sink only.
    pub fn new(severity: Severity, key: MessageKey, directory: impl Into<PathBuf>) -> Self {
        Self {
            severity,
            key,
            params: IndexMap::new(),
            destination: Destination::Global,
            directory: directory.into(),
        }
    }

    /// Create a free-text event.
    pub fn raw(
        severity: Severity,
        directory: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(severity, MessageKey::Raw, directory).with("message", message.into())
    }

    /// Attach a parameter.
    pub fn with(mut self, name: &str, value: impl ToString) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    /// Attach a path parameter.
    pub fn with_path(self, name: &str, path: &Path) -> Self {
        let value = path.display().to_string();
        self.with(name, value)
    }

    /// Also route the event to the directory log.
    pub fn for_directory_log(mut self) -> Self {
        self.destination = Destination::Directory;
        self
    }

    /// Look up a parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Whether the event must also be written to the directory log.
    pub fn is_directory_event(&self) -> bool {
        self.destination == Destination::Directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_names() {
        assert_eq!(Severity::Warning.to_string(), "WARNING");
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
        assert_eq!("ERROR".parse::<Severity>().unwrap(), Severity::Error);
        assert!(Severity::Critical > Severity::Error);
    }

    #[test]
    fn test_event_builder() {
        let event = LogEvent::new(Severity::Info, MessageKey::TaskStart, "/photos")
            .with("filename", "a.jpg")
            .with("size", 12)
            .for_directory_log();

        assert_eq!(event.param("filename"), Some("a.jpg"));
        assert_eq!(event.param("size"), Some("12"));
        assert!(event.is_directory_event());
        let names: Vec<_> = event.params.keys().cloned().collect();
        assert_eq!(names, vec!["filename", "size"]);
    }

    #[test]
    fn test_raw_event() {
        let event = LogEvent::raw(Severity::Debug, "/d", "hello");
        assert_eq!(event.key, MessageKey::Raw);
        assert_eq!(event.param("message"), Some("hello"));
        assert_eq!(event.destination, Destination::Global);
    }

    #[test]
    fn test_event_serializes() {
        let event = LogEvent::new(Severity::Error, MessageKey::RenameFailed, "/d").with("temp", "x");
        let json = serde_json::to_string(&event).unwrap();
        let back: LogEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
