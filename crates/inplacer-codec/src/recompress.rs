//! Format-preserving recompression.

use std::fs;
use std::io::{Seek, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageError, ImageFormat};
use tracing::debug;

use inplacer_core::{TransformError, TransformParams, Transformer};

use crate::SUPPORTED_EXTENSIONS;
use crate::image_io::{
    Decoded, attach_metadata, decode, flatten_onto_white, write_bytes, write_output,
};
use crate::webp_io;

/// Re-encodes every image in its own format, replacing it under the same name.
///
/// ICC profiles and EXIF blocks survive for JPEG, PNG and WebP.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecompressTransformer;

impl RecompressTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for RecompressTransformer {
    fn name(&self) -> &str {
        "recompress"
    }

    fn supported_extensions(&self) -> &[&str] {
        SUPPORTED_EXTENSIONS
    }

    fn transform(
        &self,
        source: &Path,
        temp_output: &Path,
        params: &TransformParams,
    ) -> Result<(), TransformError> {
        let size = fs::metadata(source)?.len();
        let decoded = decode(source)?;

        match decoded.format {
            ImageFormat::WebP => {
                let lossless = params.lossless;
                debug!(quality = params.quality, lossless, "Encoding WebP");
                let bytes = webp_io::encode(
                    &decoded.image,
                    lossless,
                    params.quality,
                    &decoded.metadata,
                )?;
                write_bytes(temp_output, &bytes)
            }
            ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Bmp | ImageFormat::Tiff => {
                write_output(temp_output, |w| encode(&decoded, params, size, w))
            }
            other => Err(TransformError::unsupported(format!(
                "{other:?} in {}",
                source.display()
            ))),
        }
    }
}

fn encode<W: Write + Seek>(
    decoded: &Decoded,
    params: &TransformParams,
    size: u64,
    w: &mut W,
) -> Result<(), ImageError> {
    let image = &decoded.image;
    match decoded.format {
        ImageFormat::Jpeg => {
            // JPEG has no lossless mode; the highest quality is the closest match.
            let quality = if params.lossless {
                100
            } else {
                params.quality_for(size)
            };
            debug!(quality, size, "Encoding JPEG");
            let mut encoder = JpegEncoder::new_with_quality(w, quality);
            attach_metadata(&mut encoder, &decoded.metadata);
            flatten_onto_white(image).write_with_encoder(encoder)
        }
        ImageFormat::Png => {
            let mut encoder = if params.optimize {
                PngEncoder::new_with_quality(w, CompressionType::Best, FilterType::Adaptive)
            } else {
                PngEncoder::new_with_quality(w, CompressionType::Default, FilterType::Sub)
            };
            attach_metadata(&mut encoder, &decoded.metadata);
            image.write_with_encoder(encoder)
        }
        other => image.write_to(w, other),
    }
}
