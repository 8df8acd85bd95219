//! Turns structured events into human-readable lines.

use humansize::{BINARY, format_size};

use inplacer_core::{LogEvent, MessageKey};

/// Message template for `key`. Placeholders are `{name}`.
fn template(key: MessageKey) -> &'static str {
    match key {
        MessageKey::SkipProcessed => "Skipping {filename}, already recorded in {ledger}",
        MessageKey::TaskStart => "Processing {filename} -> {destination}",
        MessageKey::DestinationClaimed => {
            "Skipping {filename}: {destination} is already the output of another file in this run"
        }
        MessageKey::OriginalSize => "Original size of {filename}: {size_bytes}",
        MessageKey::SizeCheckFailed => "Cannot read size of {filename}: {error}",
        MessageKey::TransformOptions => {
            "Transforming {filename} with {mode} (quality {quality}, lossless {lossless}, optimize {optimize})"
        }
        MessageKey::TransformFailed => "Transform of {filename} failed: {error}",
        MessageKey::TempCleanupFailed => "Cannot remove temporary file {temp}: {error}",
        MessageKey::TempInvalid => "Output of {filename} at {temp} is {reason}, keeping original",
        MessageKey::RemoveOriginalFailed => {
            "Cannot remove original {filename}: {error}. Transformed output kept at {temp}"
        }
        MessageKey::OverwriteExisting => "Overwriting existing file {destination}",
        MessageKey::DestinationBlocked => {
            "Original removed but existing {destination} cannot be removed: {error}. Output is at {temp}, manual intervention required"
        }
        MessageKey::RenameFailed => {
            "Original removed but {temp} cannot be renamed to {destination}: {error}. Manual intervention required"
        }
        MessageKey::Replaced => {
            "Replaced {filename} -> {destination}: {original_bytes} -> {output_bytes} ({percent}% reduction)"
        }
        MessageKey::LedgerWriteFailed => {
            "Replaced {filename} but cannot record it in {ledger}: {error}"
        }
        MessageKey::TaskTimeout => "Processing {filename} timed out after {seconds}s",
        MessageKey::TaskPanicked => "Processing {filename} panicked: {error}",
        MessageKey::DirectoryComplete => "{count} files processed in this directory",
        MessageKey::Raw => "{message}",
    }
}

/// Renders [`LogEvent`]s to text.
///
/// Parameters whose name ends in `_bytes` are shown as human-readable sizes.
/// Unknown placeholders are left in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventRenderer;

impl EventRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render `event` to a single line.
    pub fn render(&self, event: &LogEvent) -> String {
        let template = template(event.key);
        let mut out = String::with_capacity(template.len() + 32);
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };

            let name = &after[..close];
            match event.param(name) {
                Some(value) => out.push_str(&format_param(name, value)),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[close + 1..];
        }

        out.push_str(rest);
        out
    }
}

fn format_param(name: &str, value: &str) -> String {
    if name.ends_with("_bytes") {
        if let Ok(bytes) = value.parse::<u64>() {
            return format_size(bytes, BINARY);
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use inplacer_core::Severity;

    #[test]
    fn test_render_substitutes_params() {
        let event = LogEvent::new(Severity::Warning, MessageKey::OverwriteExisting, "/d")
            .with("destination", "/d/photo.webp");
        assert_eq!(
            EventRenderer::new().render(&event),
            "Overwriting existing file /d/photo.webp"
        );
    }

    #[test]
    fn test_render_formats_byte_params() {
        let event = LogEvent::new(Severity::Info, MessageKey::OriginalSize, "/d")
            .with("filename", "a.jpg")
            .with("size_bytes", 2048u64);
        assert_eq!(
            EventRenderer::new().render(&event),
            "Original size of a.jpg: 2 KiB"
        );
    }

    #[test]
    fn test_render_keeps_missing_placeholders() {
        let event = LogEvent::new(Severity::Info, MessageKey::DirectoryComplete, "/d");
        assert_eq!(
            EventRenderer::new().render(&event),
            "{count} files processed in this directory"
        );
    }

    #[test]
    fn test_render_raw() {
        let event = LogEvent::raw(Severity::Info, "/d", "plain {text");
        assert_eq!(EventRenderer::new().render(&event), "plain {text");
    }
}
