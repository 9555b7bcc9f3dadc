//! Per-image recompression: decode, normalize to opaque RGB, optionally
//! downsize, re-encode as JPEG at the level's quality.

use std::io::Cursor;

use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, Rgb, RgbImage};

use crate::config::defaults::MIN_SOURCE_BYTES;
use crate::config::{CompressionLevel, LevelSettings};
use crate::error::DecodeError;

/// Why an image was left untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Source below the byte-size floor; re-encoding tiny images risks growth
    TinySource,
    /// Re-encoded bytes were not smaller than the source
    NotSmaller,
}

/// Verdict for one (image, level) pair.
#[derive(Debug)]
pub enum RecompressOutcome {
    /// New JPEG bytes, strictly smaller than the source
    Replaced {
        bytes: Vec<u8>,
        width: u32,
        height: u32,
    },
    /// Keep the original bytes
    Skipped(SkipReason),
}

/// Recompress encoded image bytes (PNG, JPEG, GIF, BMP, TIFF, ...) for one
/// level. Returns `Skipped` when the source is below the size floor or when
/// the re-encoded JPEG fails to shrink it.
pub fn recompress(raw: &[u8], level: CompressionLevel) -> Result<RecompressOutcome, DecodeError> {
    if raw.len() < MIN_SOURCE_BYTES {
        return Ok(RecompressOutcome::Skipped(SkipReason::TinySource));
    }

    let img = decode_oriented(raw)?;
    let (bytes, width, height) = recompress_pixels(img, level)?;

    if bytes.len() < raw.len() {
        Ok(RecompressOutcome::Replaced {
            bytes,
            width,
            height,
        })
    } else {
        Ok(RecompressOutcome::Skipped(SkipReason::NotSmaller))
    }
}

/// Normalize, resize, and JPEG-encode an already-decoded pixel buffer.
///
/// The PDF path decodes its own stream formats and enters here; the byte
/// verdict against the stored stream is the caller's to make.
pub fn recompress_pixels(
    img: DynamicImage,
    level: CompressionLevel,
) -> Result<(Vec<u8>, u32, u32), DecodeError> {
    let settings = level.settings();
    let rgb = flatten_to_rgb(img);
    let (width, height) = rgb.dimensions();

    let (target_width, target_height) =
        target_dimensions(width, height, &settings, level.preserves_resolution());

    let rgb = if (target_width, target_height) != (width, height) {
        image::imageops::resize(&rgb, target_width, target_height, FilterType::Lanczos3)
    } else {
        rgb
    };

    let bytes = encode_jpeg(&rgb, &settings)?;
    Ok((bytes, target_width, target_height))
}

/// Decode with format guessing and bake in the EXIF orientation, so stored
/// pixels match display orientation.
fn decode_oriented(raw: &[u8]) -> Result<DynamicImage, DecodeError> {
    let reader = ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(|e| DecodeError::Unrecognized(e.to_string()))?;

    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Composite alpha/palette sources onto opaque white and convert everything
/// to 8-bit RGB. The output codec has no transparency and takes 3 channels.
fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }

    let rgba = img.into_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    for (dst, src) in rgb.pixels_mut().zip(rgba.pixels()) {
        let alpha = u32::from(src[3]);
        for channel in 0..3 {
            let blended = u32::from(src[channel]) * alpha + 255 * (255 - alpha) + 127;
            dst[channel] = (blended / 255) as u8;
        }
    }

    rgb
}

/// Target dimensions for one level: scale by `min(max_w/w, max_h/h)` when
/// that ratio is below 1, at least 1 px per side. Levels that preserve
/// resolution widen the bounds to the source dimensions instead.
fn target_dimensions(
    width: u32,
    height: u32,
    settings: &LevelSettings,
    preserve_resolution: bool,
) -> (u32, u32) {
    if preserve_resolution || (width <= settings.max_width && height <= settings.max_height) {
        return (width, height);
    }

    let ratio_w = f64::from(settings.max_width) / f64::from(width);
    let ratio_h = f64::from(settings.max_height) / f64::from(height);
    let ratio = ratio_w.min(ratio_h);

    let target_width = ((f64::from(width) * ratio) as u32).max(1);
    let target_height = ((f64::from(height) * ratio) as u32).max(1);
    (target_width, target_height)
}

fn encode_jpeg(rgb: &RgbImage, settings: &LevelSettings) -> Result<Vec<u8>, DecodeError> {
    let (width, height) = rgb.dimensions();
    let width_u16 =
        u16::try_from(width).map_err(|_| DecodeError::TooLarge(width, height))?;
    let height_u16 =
        u16::try_from(height).map_err(|_| DecodeError::TooLarge(width, height))?;

    let mut bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut bytes, settings.quality);
    encoder.set_sampling_factor(settings.chroma_subsampling.sampling_factor());
    encoder.set_optimized_huffman_tables(true);
    encoder.encode(
        rgb.as_raw(),
        width_u16,
        height_u16,
        jpeg_encoder::ColorType::Rgb,
    )?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{noise_rgb, noise_rgba, png_bytes};

    #[test]
    fn test_tiny_source_is_skipped() {
        // 800 bytes of anything stays untouched at every level
        let raw = vec![0u8; 800];
        for level in CompressionLevel::ALL {
            match recompress(&raw, level).unwrap() {
                RecompressOutcome::Skipped(SkipReason::TinySource) => {}
                other => panic!("expected tiny-source skip, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_unrecognized_bytes_fail_decode() {
        let raw = vec![0x42u8; 4096];
        let err = recompress(&raw, CompressionLevel::Medium).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Unrecognized(_) | DecodeError::Image(_)
        ));
    }

    #[test]
    fn test_extreme_resizes_and_shrinks() {
        // 1200x1600 has the same 3:4 aspect as the 600x800 extreme bounds
        let png = png_bytes(&noise_rgba(1200, 1600));
        match recompress(&png, CompressionLevel::Extreme).unwrap() {
            RecompressOutcome::Replaced {
                bytes,
                width,
                height,
            } => {
                assert_eq!((width, height), (600, 800));
                assert!(bytes.len() < png.len());
                // JPEG SOI marker
                assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
            }
            other => panic!("expected replacement, got {:?}", other),
        }
    }

    #[test]
    fn test_narrow_image_uses_smaller_ratio() {
        // 3000 wide, 400 tall: width ratio 0.2 wins, height follows
        let png = png_bytes(&noise_rgb(3000, 400));
        match recompress(&png, CompressionLevel::Extreme).unwrap() {
            RecompressOutcome::Replaced { width, height, .. } => {
                assert_eq!((width, height), (600, 80));
            }
            other => panic!("expected replacement, got {:?}", other),
        }
    }

    // APP1 segment holding a little-endian TIFF block with only the
    // orientation tag (0x0112)
    fn exif_orientation_segment(orientation: u8) -> Vec<u8> {
        let mut segment = vec![0xFF, 0xE1, 0x00, 0x22];
        segment.extend_from_slice(b"Exif\0\0");
        segment.extend_from_slice(&[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]);
        segment.extend_from_slice(&[0x01, 0x00]);
        segment.extend_from_slice(&[0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00]);
        segment.extend_from_slice(&[orientation, 0x00, 0x00, 0x00]);
        segment.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        segment
    }

    fn jpeg_with_orientation(img: &DynamicImage, orientation: u8) -> Vec<u8> {
        let rgb = img.to_rgb8();
        let mut jpeg = Vec::new();
        let encoder = jpeg_encoder::Encoder::new(&mut jpeg, 90);
        encoder
            .encode(
                rgb.as_raw(),
                rgb.width() as u16,
                rgb.height() as u16,
                jpeg_encoder::ColorType::Rgb,
            )
            .unwrap();

        // Splice the segment right after the SOI marker
        let mut tagged = jpeg[..2].to_vec();
        tagged.extend_from_slice(&exif_orientation_segment(orientation));
        tagged.extend_from_slice(&jpeg[2..]);
        tagged
    }

    #[test]
    fn test_exif_orientation_baked_into_output() {
        // Orientation 6 is a 90-degree clockwise rotation: a 400x300 source
        // displays as 300x400 and the output must carry those dimensions
        let jpeg = jpeg_with_orientation(&noise_rgb(400, 300), 6);
        match recompress(&jpeg, CompressionLevel::Extreme).unwrap() {
            RecompressOutcome::Replaced { width, height, .. } => {
                assert_eq!((width, height), (300, 400));
            }
            other => panic!("expected replacement, got {:?}", other),
        }
    }

    #[test]
    fn test_basic_preserves_resolution() {
        // Far beyond the basic bounds, yet dimensions must not change
        let png = png_bytes(&noise_rgb(2400, 3000));
        match recompress(&png, CompressionLevel::Basic).unwrap() {
            RecompressOutcome::Replaced { width, height, .. } => {
                assert_eq!((width, height), (2400, 3000));
            }
            other => panic!("expected replacement, got {:?}", other),
        }
    }

    #[test]
    fn test_transparency_flattened_onto_white() {
        let mut rgba = image::RgbaImage::from_pixel(64, 64, image::Rgba([0, 0, 0, 255]));
        // Fully transparent right half must come out white
        for y in 0..64 {
            for x in 32..64 {
                rgba.put_pixel(x, y, image::Rgba([10, 200, 30, 0]));
            }
        }
        let rgb = flatten_to_rgb(DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(48, 32), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(16, 32), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_half_transparent_pixel_blends_toward_white() {
        let rgba = image::RgbaImage::from_pixel(8, 8, image::Rgba([0, 0, 0, 128]));
        let rgb = flatten_to_rgb(DynamicImage::ImageRgba8(rgba));
        let pixel = rgb.get_pixel(4, 4);
        assert!(pixel[0] > 120 && pixel[0] < 135, "got {:?}", pixel);
    }

    #[test]
    fn test_target_dimensions_math() {
        let settings = CompressionLevel::Extreme.settings();
        // 3000x4000 against 600x800: ratio 0.2 both ways
        assert_eq!(target_dimensions(3000, 4000, &settings, false), (600, 800));
        // Within bounds: untouched
        assert_eq!(target_dimensions(500, 700, &settings, false), (500, 700));
        // Preserve-resolution ignores the bounds entirely
        assert_eq!(target_dimensions(3000, 4000, &settings, true), (3000, 4000));
        // Degenerate aspect never collapses below 1 px
        assert_eq!(target_dimensions(100_000, 10, &settings, false).1, 1);
    }
}
