//! The pluggable content transform.

use std::path::Path;

use crate::error::TransformError;
use crate::STATE_FILE_PREFIX;
use crate::params::TransformParams;

/// A content transform applied to each eligible file.
///
/// Implementations must write a complete file at `temp_output` and must not
/// touch `source`. Everything around the call (temp naming, verification,
/// the swap and the ledger) is handled by the caller.
pub trait Transformer: Send + Sync {
    /// Short mode name, used to derive per-mode ledger and log file names.
    fn name(&self) -> &str;

    /// Lower-case extensions (without dot) this transform accepts.
    fn supported_extensions(&self) -> &[&str];

    /// Extension of the output when it differs from the input.
    ///
    /// `None` means the transform preserves the format and replaces the file
    /// under its own name.
    fn output_extension(&self) -> Option<&str> {
        None
    }

    /// Free-text note about how `source` will be encoded, written to the
    /// directory log before the transform runs.
    fn describe(&self, _source: &Path, _params: &TransformParams) -> Option<String> {
        None
    }

    /// Transform `source` into `temp_output`.
    fn transform(
        &self,
        source: &Path,
        temp_output: &Path,
        params: &TransformParams,
    ) -> Result<(), TransformError>;
}

/// Default ledger file name for a mode.
pub fn ledger_file_name_for(mode: &str) -> String {
    format!("{STATE_FILE_PREFIX}{mode}_done.txt")
}

/// Default directory log file name for a mode.
pub fn dir_log_file_name_for(mode: &str) -> String {
    format!("{STATE_FILE_PREFIX}{mode}.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_mode_file_names() {
        assert_eq!(ledger_file_name_for("webp"), ".inplacer_webp_done.txt");
        assert_eq!(dir_log_file_name_for("recompress"), ".inplacer_recompress.log");
        assert_ne!(ledger_file_name_for("webp"), ledger_file_name_for("recompress"));
    }
}
