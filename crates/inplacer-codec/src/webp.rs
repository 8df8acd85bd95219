//! Conversion to WebP.

use std::path::Path;

use image::ImageFormat;
use tracing::debug;

use inplacer_core::{TransformError, TransformParams, Transformer};

use crate::SUPPORTED_EXTENSIONS;
use crate::image_io::{decode, write_bytes};
use crate::webp_io::{self, effective_lossless};

/// Converts images to WebP. The output replaces the source as `<stem>.webp`.
///
/// Photographic sources are encoded lossy at `quality`; PNG, BMP and TIFF
/// sources, or any source when `lossless` is set, are encoded losslessly.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpTransformer;

impl WebpTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for WebpTransformer {
    fn name(&self) -> &str {
        "webp"
    }

    fn supported_extensions(&self) -> &[&str] {
        SUPPORTED_EXTENSIONS
    }

    fn output_extension(&self) -> Option<&str> {
        Some("webp")
    }

    fn describe(&self, source: &Path, params: &TransformParams) -> Option<String> {
        let format = ImageFormat::from_path(source).ok()?;
        let name = source.file_name()?.to_string_lossy();
        let mode = if effective_lossless(params, format) {
            "lossless"
        } else {
            "lossy"
        };
        Some(format!(
            "Converting {name} to WebP, quality {}, {mode}",
            params.quality
        ))
    }

    fn transform(
        &self,
        source: &Path,
        temp_output: &Path,
        params: &TransformParams,
    ) -> Result<(), TransformError> {
        let decoded = decode(source)?;
        let lossless = effective_lossless(params, decoded.format);
        debug!(
            path = %source.display(),
            format = ?decoded.format,
            quality = params.quality,
            lossless,
            "Converting to WebP"
        );

        let bytes = webp_io::encode(&decoded.image, lossless, params.quality, &decoded.metadata)?;
        write_bytes(temp_output, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let t = WebpTransformer::new();
        assert_eq!(t.name(), "webp");
        assert_eq!(t.output_extension(), Some("webp"));
        assert!(t.supported_extensions().contains(&"bmp"));
    }

    #[test]
    fn test_describe_names_encoding_mode() {
        let t = WebpTransformer::new();
        let params = TransformParams {
            quality: 70,
            ..Default::default()
        };

        assert_eq!(
            t.describe(Path::new("/p/photo.jpg"), &params).as_deref(),
            Some("Converting photo.jpg to WebP, quality 70, lossy")
        );
        assert_eq!(
            t.describe(Path::new("/p/scan.TIFF"), &params).as_deref(),
            Some("Converting scan.TIFF to WebP, quality 70, lossless")
        );
    }
}
