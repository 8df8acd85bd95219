//! Image transformers for inplacer.
//!
//! Two modes are provided:
//!
//! - [`RecompressTransformer`] re-encodes JPEG, PNG, BMP, TIFF and WebP in
//!   their own format.
//! - [`WebpTransformer`] converts the same inputs to WebP, lossy for
//!   photographic sources and lossless for the rest.
//!
//! Both carry the source's ICC profile and EXIF block into JPEG, PNG and
//! WebP output.

mod image_io;
mod recompress;
mod webp;
mod webp_io;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr, VariantNames};

use inplacer_core::Transformer;

pub use recompress::RecompressTransformer;
pub use webp::WebpTransformer;

/// Input extensions both transformers accept.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// Which transformer a run uses.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mode {
    /// Re-encode in place, keeping the format.
    #[default]
    Recompress,
    /// Convert to WebP.
    Webp,
}

impl Mode {
    /// Transformer implementing this mode.
    pub fn transformer(self) -> Arc<dyn Transformer> {
        match self {
            Self::Recompress => Arc::new(RecompressTransformer::new()),
            Self::Webp => Arc::new(WebpTransformer::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names_match_transformers() {
        for mode in [Mode::Recompress, Mode::Webp] {
            assert_eq!(mode.transformer().name(), mode.to_string());
        }
        assert_eq!("WEBP".parse::<Mode>().unwrap(), Mode::Webp);
        assert_eq!(Mode::VARIANTS, &["recompress", "webp"]);
    }
}
