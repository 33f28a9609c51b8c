//! Image preprocessing before recognition
//!
//! Decodes encoded payloads and caps the longest edge of every image so
//! recognition latency and memory stay bounded on large camera or scanner
//! captures. This is the only place image size is controlled.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use tracing::debug;

use super::error::ImagePreparationError;
use super::task::{ImageData, Orientation};

/// Resampling filter used when downscaling
const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Image ready to hand to a recognition engine
#[derive(Debug)]
pub struct PreparedImage {
    /// Pixels, longest edge within the configured maximum
    pub image: DynamicImage,
    /// Orientation of `image`'s pixels
    pub orientation: Orientation,
    /// Whether the image was resampled
    pub resized: bool,
}

/// Decode (if needed) and bound an image to `max_dimension` on its longest edge.
///
/// An image already within the limit is returned untouched.
pub fn prepare_image(
    data: ImageData,
    orientation: Orientation,
    max_dimension: u32,
) -> Result<PreparedImage, ImagePreparationError> {
    let (image, orientation) = match data {
        ImageData::Decoded(image) => (image, orientation),
        ImageData::Encoded(bytes) => {
            let (image, exif) = decode(&bytes)?;
            // An explicit orientation from the caller wins over EXIF
            let orientation = match (orientation, exif) {
                (Orientation::Up, Some(exif)) => exif,
                (orientation, _) => orientation,
            };
            (image, orientation)
        }
    };

    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ImagePreparationError::Empty { width, height });
    }

    match scaled_dimensions(width, height, max_dimension) {
        None => Ok(PreparedImage {
            image,
            orientation,
            resized: false,
        }),
        Some((new_width, new_height)) => {
            debug!(
                "Downscaling {}x{} image to {}x{} (max dimension {})",
                width, height, new_width, new_height, max_dimension
            );
            Ok(PreparedImage {
                image: image.resize_exact(new_width, new_height, RESIZE_FILTER),
                orientation,
                resized: true,
            })
        }
    }
}

/// Decode encoded bytes, returning the EXIF orientation when present
fn decode(bytes: &[u8]) -> Result<(DynamicImage, Option<Orientation>), ImagePreparationError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation().ok().map(Orientation::from);
    let image = DynamicImage::from_decoder(decoder)?;
    Ok((image, orientation))
}

/// Target size for an image whose longest edge exceeds `max_dimension`.
///
/// Returns `None` when no resampling is needed. Aspect ratio is preserved
/// and neither edge drops below one pixel.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let max_dimension = max_dimension.max(1);
    let longest = width.max(height);
    if longest <= max_dimension {
        return None;
    }

    let scale = f64::from(max_dimension) / f64::from(longest);
    let scale_edge = |edge: u32| -> u32 {
        if edge == longest {
            max_dimension
        } else {
            ((f64::from(edge) * scale).round() as u32).clamp(1, max_dimension)
        }
    };

    Some((scale_edge(width), scale_edge(height)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn test_small_image_returned_unchanged() {
        let original = gradient(120, 80);
        let expected = original.to_rgb8();

        let prepared = prepare_image(ImageData::Decoded(original), Orientation::Up, 120).unwrap();

        assert!(!prepared.resized);
        assert_eq!(prepared.image.to_rgb8(), expected);
    }

    #[test]
    fn test_large_image_bounded_preserving_aspect() {
        let prepared =
            prepare_image(ImageData::Decoded(gradient(400, 100)), Orientation::Up, 200).unwrap();

        assert!(prepared.resized);
        assert_eq!(prepared.image.width(), 200);
        assert_eq!(prepared.image.height(), 50);
    }

    #[test]
    fn test_portrait_image_bounded_on_height() {
        assert_eq!(scaled_dimensions(3000, 4000, 3000), Some((2250, 3000)));
        assert_eq!(scaled_dimensions(3000, 3000, 3000), None);
        assert_eq!(scaled_dimensions(10_000, 1, 100), Some((100, 1)));
    }

    #[test]
    fn test_empty_image_rejected() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 10));
        let result = prepare_image(ImageData::Decoded(empty), Orientation::Up, 100);
        assert!(matches!(result, Err(ImagePreparationError::Empty { .. })));
    }

    #[test]
    fn test_encoded_png_decoded_and_bounded() {
        let mut bytes = Vec::new();
        gradient(64, 32)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let prepared = prepare_image(ImageData::Encoded(bytes), Orientation::Down, 32).unwrap();
        assert_eq!((prepared.image.width(), prepared.image.height()), (32, 16));
        // Explicit orientation kept
        assert_eq!(prepared.orientation, Orientation::Down);
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let result = prepare_image(
            ImageData::Encoded(b"definitely not an image".to_vec()),
            Orientation::Up,
            100,
        );
        assert!(matches!(
            result,
            Err(ImagePreparationError::Decode(_)) | Err(ImagePreparationError::Io(_))
        ));
    }
}
