use std::fs;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{
    ColorType, DynamicImage, GrayImage, ImageDecoder, ImageEncoder, ImageFormat, ImageReader,
    Luma, Rgb, RgbImage, Rgba, RgbaImage,
};
use inplacer_codec::{Mode, RecompressTransformer, WebpTransformer};
use inplacer_core::{LargeFilePolicy, TransformParams, Transformer};
use tempfile::TempDir;

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
    })
}

/// Photographic-looking content: a gradient with deterministic noise.
fn noisy(width: u32, height: u32) -> RgbImage {
    let mut state = 0x2545_f491_u32;
    RgbImage::from_fn(width, height, |x, y| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let n = (state >> 24) as u8 / 4;
        Rgb([
            ((x * 255 / width) as u8).wrapping_add(n),
            ((y * 255 / height) as u8).wrapping_add(n),
            (((x + y) * 127 / (width + height)) as u8).wrapping_add(n),
        ])
    })
}

fn convert_at(source: &Path, output: &Path, quality: u8) -> u64 {
    let params = TransformParams {
        quality,
        ..Default::default()
    };
    WebpTransformer::new()
        .transform(source, output, &params)
        .unwrap();
    fs::metadata(output).unwrap().len()
}

fn metadata_of(path: &Path) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
    let mut decoder = ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .into_decoder()
        .unwrap();
    (
        decoder.icc_profile().unwrap(),
        decoder.exif_metadata().unwrap(),
    )
}

fn read_back(path: &Path) -> (image::DynamicImage, Option<ImageFormat>) {
    let reader = ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap();
    let format = reader.format();
    (reader.decode().unwrap(), format)
}

#[test]
fn test_recompress_keeps_format_and_dimensions() {
    let temp = TempDir::new().unwrap();
    let cases = [
        ("a.jpg", ImageFormat::Jpeg),
        ("b.png", ImageFormat::Png),
        ("c.bmp", ImageFormat::Bmp),
        ("d.tiff", ImageFormat::Tiff),
        ("e.webp", ImageFormat::WebP),
    ];

    for (name, format) in cases {
        let source = temp.path().join(name);
        gradient(32, 24).save_with_format(&source, format).unwrap();
        let output = temp.path().join(format!("{name}.out"));

        RecompressTransformer::new()
            .transform(&source, &output, &TransformParams::default())
            .unwrap();

        let (image, detected) = read_back(&output);
        assert_eq!(detected, Some(format), "{name}");
        assert_eq!((image.width(), image.height()), (32, 24), "{name}");
    }
}

#[test]
fn test_recompress_jpeg_quality_follows_params() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("photo.jpg");
    gradient(128, 128)
        .save_with_format(&source, ImageFormat::Jpeg)
        .unwrap();

    let high = temp.path().join("high.out");
    let low = temp.path().join("low.out");
    let t = RecompressTransformer::new();
    t.transform(
        &source,
        &high,
        &TransformParams {
            quality: 95,
            large_file: None,
            ..Default::default()
        },
    )
    .unwrap();
    // Threshold of zero makes every file "large".
    t.transform(
        &source,
        &low,
        &TransformParams {
            quality: 95,
            large_file: Some(LargeFilePolicy {
                threshold_bytes: 0,
                quality: 10,
            }),
            ..Default::default()
        },
    )
    .unwrap();

    let high_len = std::fs::metadata(&high).unwrap().len();
    let low_len = std::fs::metadata(&low).unwrap().len();
    assert!(low_len < high_len, "{low_len} >= {high_len}");
}

#[test]
fn test_recompress_png_keeps_alpha() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("logo.png");
    RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]))
        .save_with_format(&source, ImageFormat::Png)
        .unwrap();
    let output = temp.path().join("logo.out");

    RecompressTransformer::new()
        .transform(&source, &output, &TransformParams::default())
        .unwrap();

    let (image, format) = read_back(&output);
    assert_eq!(format, Some(ImageFormat::Png));
    assert!(image.color().has_alpha());
}

#[test]
fn test_webp_conversion() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("photo.bmp");
    gradient(16, 16)
        .save_with_format(&source, ImageFormat::Bmp)
        .unwrap();
    let output = temp.path().join("photo.webp.tmp");

    WebpTransformer::new()
        .transform(&source, &output, &TransformParams::default())
        .unwrap();

    let (image, format) = read_back(&output);
    assert_eq!(format, Some(ImageFormat::WebP));
    // Lossless encoding reproduces the pixels exactly.
    assert_eq!(image.to_rgb8(), gradient(16, 16));
    assert!(source.exists());
}

#[test]
fn test_corrupt_input_fails_without_output() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("broken.jpg");
    std::fs::write(&source, b"\xFF\xD8\xFF not really a jpeg").unwrap();
    let output = temp.path().join("broken.out");

    for mode in [Mode::Recompress, Mode::Webp] {
        let result = mode
            .transformer()
            .transform(&source, &output, &TransformParams::default());
        assert!(result.is_err(), "{mode}");
    }
    assert!(!output.exists());
}

#[test]
fn test_webp_quality_controls_lossy_size() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("photo.jpg");
    noisy(256, 256)
        .save_with_format(&source, ImageFormat::Jpeg)
        .unwrap();
    let source_len = fs::metadata(&source).unwrap().len();

    let low = convert_at(&source, &temp.path().join("low.webp.tmp"), 10);
    let high = convert_at(&source, &temp.path().join("high.webp.tmp"), 90);

    assert!(low < high, "q10 {low} >= q90 {high}");
    assert!(low < source_len, "q10 {low} >= source {source_len}");
    let (image, format) = read_back(&temp.path().join("low.webp.tmp"));
    assert_eq!(format, Some(ImageFormat::WebP));
    assert_eq!((image.width(), image.height()), (256, 256));
}

#[test]
fn test_recompress_lossy_webp_stays_lossy() {
    let temp = TempDir::new().unwrap();
    let jpeg = temp.path().join("photo.jpg");
    noisy(256, 256)
        .save_with_format(&jpeg, ImageFormat::Jpeg)
        .unwrap();
    let webp = temp.path().join("photo.webp");
    let webp_len = convert_at(&jpeg, &webp, 90);

    let output = temp.path().join("photo.out");
    RecompressTransformer::new()
        .transform(
            &webp,
            &output,
            &TransformParams {
                quality: 30,
                ..Default::default()
            },
        )
        .unwrap();

    let output_len = fs::metadata(&output).unwrap().len();
    assert!(output_len < webp_len, "{output_len} >= {webp_len}");
}

#[test]
fn test_recompress_grayscale_jpeg_stays_single_channel() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("scan.jpg");
    GrayImage::from_fn(32, 32, |x, y| Luma([((x * y) % 256) as u8]))
        .save_with_format(&source, ImageFormat::Jpeg)
        .unwrap();
    let output = temp.path().join("scan.out");

    RecompressTransformer::new()
        .transform(&source, &output, &TransformParams::default())
        .unwrap();

    let (image, _) = read_back(&output);
    assert_eq!(image.color(), ColorType::L8);
}

#[test]
fn test_icc_and_exif_survive_both_modes() {
    const ICC: &[u8] = b"inplacer test icc profile payload";
    // Little-endian TIFF header with an empty IFD.
    const EXIF: &[u8] = b"II*\0\x08\0\0\0\0\0\0\0\0\0";

    let temp = TempDir::new().unwrap();
    let source = temp.path().join("camera.jpg");
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, 90);
    encoder.set_icc_profile(ICC.to_vec()).unwrap();
    encoder.set_exif_metadata(EXIF.to_vec()).unwrap();
    DynamicImage::ImageRgb8(noisy(64, 48))
        .write_with_encoder(encoder)
        .unwrap();
    fs::write(&source, &bytes).unwrap();
    assert_eq!(metadata_of(&source), (Some(ICC.to_vec()), Some(EXIF.to_vec())));

    let recompressed = temp.path().join("camera.out");
    RecompressTransformer::new()
        .transform(&source, &recompressed, &TransformParams::default())
        .unwrap();
    assert_eq!(
        metadata_of(&recompressed),
        (Some(ICC.to_vec()), Some(EXIF.to_vec()))
    );

    let converted = temp.path().join("camera.webp.tmp");
    convert_at(&source, &converted, 80);
    assert_eq!(
        metadata_of(&converted),
        (Some(ICC.to_vec()), Some(EXIF.to_vec()))
    );
    let (image, _) = read_back(&converted);
    assert_eq!((image.width(), image.height()), (64, 48));
}
