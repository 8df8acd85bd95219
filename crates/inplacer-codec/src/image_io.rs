//! Decoding, encoding and error mapping shared by the image transformers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{
    DynamicImage, GrayImage, ImageDecoder, ImageEncoder, ImageError, ImageFormat, ImageReader,
    Luma, Rgb, RgbImage,
};
use tracing::{debug, warn};

use inplacer_core::TransformError;

/// Color profile and EXIF block carried over from the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Metadata {
    pub icc: Option<Vec<u8>>,
    pub exif: Option<Vec<u8>>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.icc.is_none() && self.exif.is_none()
    }
}

/// A decoded source image.
pub(crate) struct Decoded {
    pub image: DynamicImage,
    pub format: ImageFormat,
    pub metadata: Metadata,
}

/// Decode `source`, identifying the format from its content.
pub(crate) fn decode(source: &Path) -> Result<Decoded, TransformError> {
    let reader = ImageReader::open(source)?.with_guessed_format()?;
    let Some(format) = reader.format() else {
        return Err(TransformError::unsupported(format!(
            "unrecognized image content in {}",
            source.display()
        )));
    };

    let mut decoder = reader.into_decoder().map_err(decode_error)?;
    let metadata = Metadata {
        icc: metadata_block(decoder.icc_profile(), source, "ICC profile"),
        exif: metadata_block(decoder.exif_metadata(), source, "EXIF"),
    };
    let image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;

    Ok(Decoded {
        image,
        format,
        metadata,
    })
}

fn metadata_block(
    block: Result<Option<Vec<u8>>, ImageError>,
    source: &Path,
    what: &str,
) -> Option<Vec<u8>> {
    match block {
        Ok(block) => block.filter(|b| !b.is_empty()),
        Err(e) => {
            debug!(path = %source.display(), error = %e, "Cannot read {what}");
            None
        }
    }
}

/// Hand `metadata` to `encoder`. Blocks the encoder cannot store are dropped with a warning.
pub(crate) fn attach_metadata<E: ImageEncoder>(encoder: &mut E, metadata: &Metadata) {
    if let Some(icc) = &metadata.icc {
        if let Err(e) = encoder.set_icc_profile(icc.clone()) {
            warn!(error = %e, "ICC profile not kept");
        }
    }
    if let Some(exif) = &metadata.exif {
        if let Err(e) = encoder.set_exif_metadata(exif.clone()) {
            warn!(error = %e, "EXIF metadata not kept");
        }
    }
}

/// Create `temp`, run `encode` against a buffered writer and sync the result.
pub(crate) fn write_output<F>(temp: &Path, encode: F) -> Result<(), TransformError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ImageError>,
{
    let mut writer = BufWriter::new(File::create(temp)?);
    encode(&mut writer).map_err(encode_error)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Write an already encoded file to `temp` and sync it.
pub(crate) fn write_bytes(temp: &Path, bytes: &[u8]) -> Result<(), TransformError> {
    let mut file = File::create(temp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Composite any alpha channel onto a white background.
///
/// Grayscale input stays single-channel.
pub(crate) fn flatten_onto_white(image: &DynamicImage) -> DynamicImage {
    let color = image.color();
    match (color.has_color(), color.has_alpha()) {
        (true, false) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (false, false) => DynamicImage::ImageLuma8(image.to_luma8()),
        (true, true) => {
            let rgba = image.to_rgba8();
            let mut out = RgbImage::new(rgba.width(), rgba.height());
            for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
                let [r, g, b, a] = src.0;
                *dst = Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]);
            }
            DynamicImage::ImageRgb8(out)
        }
        (false, true) => {
            let la = image.to_luma_alpha8();
            let mut out = GrayImage::new(la.width(), la.height());
            for (src, dst) in la.pixels().zip(out.pixels_mut()) {
                let [l, a] = src.0;
                *dst = Luma([over_white(l, a)]);
            }
            DynamicImage::ImageLuma8(out)
        }
    }
}

fn over_white(c: u8, alpha: u8) -> u8 {
    let alpha = u32::from(alpha);
    ((u32::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8
}

fn decode_error(err: ImageError) -> TransformError {
    match err {
        ImageError::IoError(e) => TransformError::Io(e),
        ImageError::Unsupported(e) => TransformError::unsupported(e.to_string()),
        other => TransformError::decode(other.to_string()),
    }
}

fn encode_error(err: ImageError) -> TransformError {
    match err {
        ImageError::IoError(e) => TransformError::Io(e),
        ImageError::Unsupported(e) => TransformError::unsupported(e.to_string()),
        other => TransformError::encode(other.to_string()),
    }
}
