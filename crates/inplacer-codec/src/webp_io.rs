//! WebP encoding through libwebp, plus the RIFF container rewrite that
//! carries ICC and EXIF blocks.

use image::{DynamicImage, ImageFormat};

use inplacer_core::{TransformError, TransformParams};

use crate::image_io::Metadata;

const VP8X_ICC: u8 = 0x20;
const VP8X_ALPHA: u8 = 0x10;
const VP8X_EXIF: u8 = 0x08;

/// Whether a WebP conversion of `format` should be lossless.
///
/// Forced by `params`, or chosen for sources that were lossless to begin with.
pub(crate) fn effective_lossless(params: &TransformParams, format: ImageFormat) -> bool {
    params.lossless || matches!(format, ImageFormat::Png | ImageFormat::Bmp | ImageFormat::Tiff)
}

/// Encode `image` as a complete WebP file.
pub(crate) fn encode(
    image: &DynamicImage,
    lossless: bool,
    quality: u8,
    metadata: &Metadata,
) -> Result<Vec<u8>, TransformError> {
    let has_alpha = image.color().has_alpha();
    let (width, height) = (image.width(), image.height());

    let quality = f32::from(quality);
    let encoded = if has_alpha {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_simple(lossless, quality)
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(lossless, quality)
    };
    let encoded =
        encoded.map_err(|e| TransformError::encode(format!("WebP encoding failed: {e:?}")))?;

    if metadata.is_empty() {
        return Ok(encoded.to_vec());
    }
    embed_metadata(&encoded, width, height, has_alpha, metadata)
}

/// Rewrite a WebP file as an extended (VP8X) container holding `metadata`.
///
/// Chunk order follows the container layout: VP8X, ICCP, image data, EXIF.
pub(crate) fn embed_metadata(
    webp: &[u8],
    width: u32,
    height: u32,
    has_alpha: bool,
    metadata: &Metadata,
) -> Result<Vec<u8>, TransformError> {
    let chunks = parse_chunks(webp)?;

    let mut flags = 0u8;
    for (fourcc, payload) in &chunks {
        if *fourcc == b"VP8X" {
            flags |= payload.first().copied().unwrap_or_default() & VP8X_ALPHA;
        }
    }
    if has_alpha {
        flags |= VP8X_ALPHA;
    }
    if metadata.icc.is_some() {
        flags |= VP8X_ICC;
    }
    if metadata.exif.is_some() {
        flags |= VP8X_EXIF;
    }

    let mut vp8x = [0u8; 10];
    vp8x[0] = flags;
    vp8x[4..7].copy_from_slice(&width.saturating_sub(1).to_le_bytes()[..3]);
    vp8x[7..10].copy_from_slice(&height.saturating_sub(1).to_le_bytes()[..3]);

    let extra = metadata.icc.as_ref().map_or(0, Vec::len)
        + metadata.exif.as_ref().map_or(0, Vec::len);
    let mut body = Vec::with_capacity(webp.len() + extra + 48);
    body.extend_from_slice(b"WEBP");
    push_chunk(&mut body, b"VP8X", &vp8x);
    if let Some(icc) = &metadata.icc {
        push_chunk(&mut body, b"ICCP", icc);
    }
    for (fourcc, payload) in &chunks {
        if ![b"VP8X", b"ICCP", b"EXIF"].contains(fourcc) {
            push_chunk(&mut body, fourcc, payload);
        }
    }
    if let Some(exif) = &metadata.exif {
        push_chunk(&mut body, b"EXIF", exif);
    }

    let riff_size = u32::try_from(body.len())
        .map_err(|_| TransformError::encode("WebP output exceeds the RIFF size limit"))?;
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

type Chunk<'a> = (&'a [u8; 4], &'a [u8]);

fn parse_chunks(data: &[u8]) -> Result<Vec<Chunk<'_>>, TransformError> {
    let invalid = || TransformError::encode("encoder produced an invalid WebP container");

    if data.len() < 12 || &data[..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return Err(invalid());
    }

    let mut chunks = Vec::new();
    let mut pos = 12;
    while pos + 8 <= data.len() {
        let fourcc: &[u8; 4] = data[pos..pos + 4].try_into().map_err(|_| invalid())?;
        let size = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);
        let start = pos + 8;
        let end = start
            .checked_add(size as usize)
            .filter(|&end| end <= data.len())
            .ok_or_else(invalid)?;
        chunks.push((fourcc, &data[start..end]));
        pos = end + (end - start) % 2;
    }
    Ok(chunks)
}

fn push_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(fourcc);
    // Payloads come from the encoder or a decoded source and stay far below 4 GiB.
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(16, 8, |x, y| {
            Rgb([(x * 16) as u8, (y * 32) as u8, 128])
        }))
    }

    #[test]
    fn test_effective_lossless() {
        let lossy = TransformParams::default();
        assert!(!effective_lossless(&lossy, ImageFormat::Jpeg));
        assert!(!effective_lossless(&lossy, ImageFormat::WebP));
        assert!(effective_lossless(&lossy, ImageFormat::Png));
        assert!(effective_lossless(&lossy, ImageFormat::Tiff));

        let forced = TransformParams {
            lossless: true,
            ..Default::default()
        };
        assert!(effective_lossless(&forced, ImageFormat::Jpeg));
    }

    #[test]
    fn test_embed_metadata_layout() {
        let plain = encode(&sample(), false, 80, &Metadata::default()).unwrap();
        let metadata = Metadata {
            icc: Some(vec![1, 2, 3]),
            exif: Some(b"II*\0".to_vec()),
        };

        let extended = embed_metadata(&plain, 16, 8, false, &metadata).unwrap();
        let chunks = parse_chunks(&extended).unwrap();
        let order: Vec<&[u8; 4]> = chunks.iter().map(|(fourcc, _)| *fourcc).collect();

        assert_eq!(order, vec![b"VP8X", b"ICCP", b"VP8 ", b"EXIF"]);
        let vp8x = chunks[0].1;
        assert_eq!(vp8x[0], VP8X_ICC | VP8X_EXIF);
        assert_eq!(&vp8x[4..7], &[15, 0, 0]);
        assert_eq!(&vp8x[7..10], &[7, 0, 0]);
        // Odd-sized payloads are padded to keep chunks aligned.
        assert_eq!(chunks[1].1, &[1, 2, 3]);
        let riff_size = u32::from_le_bytes([extended[4], extended[5], extended[6], extended[7]]);
        assert_eq!(riff_size as usize, extended.len() - 8);
    }

    #[test]
    fn test_parse_rejects_truncated_container() {
        let plain = encode(&sample(), true, 80, &Metadata::default()).unwrap();
        assert!(parse_chunks(&plain[..plain.len() - 3]).is_err());
        assert!(parse_chunks(b"RIFF\0\0\0\0WAVE").is_err());
    }
}
