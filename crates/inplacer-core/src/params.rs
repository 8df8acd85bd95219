//! Parameters handed to the content transform.

use serde::{Deserialize, Serialize};

/// Quality override applied to inputs above a size threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeFilePolicy {
    /// Inputs strictly larger than this many bytes use `quality`.
    pub threshold_bytes: u64,
    /// Quality used for large inputs.
    pub quality: u8,
}

impl Default for LargeFilePolicy {
    fn default() -> Self {
        Self {
            threshold_bytes: 5 * 1024 * 1024,
            quality: 75,
        }
    }
}

/// Tuning knobs for a transform. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformParams {
    /// Lossy quality, 1..=100.
    pub quality: u8,
    /// Force lossless output where the format supports a choice.
    pub lossless: bool,
    /// Spend more effort on smaller output.
    pub optimize: bool,
    /// Optional lower quality for large inputs.
    pub large_file: Option<LargeFilePolicy>,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            quality: 85,
            lossless: false,
            optimize: true,
            large_file: Some(LargeFilePolicy::default()),
        }
    }
}

impl TransformParams {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=100).contains(&self.quality) {
            return Err(format!("Quality must be between 1 and 100, got {}", self.quality));
        }
        if let Some(policy) = &self.large_file {
            if !(1..=100).contains(&policy.quality) {
                return Err(format!(
                    "Large-file quality must be between 1 and 100, got {}",
                    policy.quality
                ));
            }
        }
        Ok(())
    }

    /// Quality to use for an input of `size` bytes.
    pub fn quality_for(&self, size: u64) -> u8 {
        match self.large_file {
            Some(policy) if size > policy.threshold_bytes => policy.quality,
            _ => self.quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TransformParams::default().validate().is_ok());
    }

    #[test]
    fn test_validate_ranges() {
        let params = TransformParams {
            quality: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = TransformParams {
            large_file: Some(LargeFilePolicy {
                threshold_bytes: 1,
                quality: 101,
            }),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_quality_for_large_files() {
        let params = TransformParams {
            quality: 90,
            large_file: Some(LargeFilePolicy {
                threshold_bytes: 1000,
                quality: 60,
            }),
            ..Default::default()
        };
        assert_eq!(params.quality_for(1000), 90);
        assert_eq!(params.quality_for(1001), 60);

        let no_policy = TransformParams {
            large_file: None,
            ..params
        };
        assert_eq!(no_policy.quality_for(u64::MAX), 90);
    }
}
