//! Bounded-size thumbnails of decoded pages

use std::sync::Arc;

use image::imageops::{self, FilterType};

use super::decoder::DecodedImage;
use crate::error::PageError;

/// Compute thumbnail dimensions for a `width` x `height` image
///
/// Aspect ratio is preserved (rounded to the nearest pixel), neither side
/// exceeds `max_dimension`, both sides are at least 1 and images that already
/// fit are never upscaled. A `max_dimension` of 0 is treated as 1.
pub fn thumbnail_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max = max_dimension.max(1);
    if width <= max && height <= max {
        return (width.max(1), height.max(1));
    }

    let scale = |short: u32, long: u32| -> u32 {
        let scaled = (u64::from(short) * u64::from(max) + u64::from(long) / 2) / u64::from(long);
        (scaled as u32).clamp(1, max)
    };

    if width >= height {
        (max, scale(height, width))
    } else {
        (scale(width, height), max)
    }
}

/// Produce a thumbnail of a decoded page
pub fn make_thumbnail(image: &DecodedImage, max_dimension: u32) -> DecodedImage {
    let (width, height) = image.dimensions();
    let (thumb_width, thumb_height) = thumbnail_dimensions(width, height, max_dimension);
    if (thumb_width, thumb_height) == (width, height) {
        return image.clone();
    }

    let resized = imageops::resize(image.pixels(), thumb_width, thumb_height, FilterType::Lanczos3);
    // thumbnail_dimensions never yields a zero side
    DecodedImage::new(resized).unwrap_or_else(|| image.clone())
}

/// Produce a thumbnail on the blocking pool
pub async fn thumbnail_off_thread(
    image: Arc<DecodedImage>,
    max_dimension: u32,
    entry: &str,
) -> Result<DecodedImage, PageError> {
    tokio::task::spawn_blocking(move || make_thumbnail(&image, max_dimension))
        .await
        .map_err(|e| PageError::Worker {
            entry: entry.to_string(),
            message: format!("thumbnail task join error: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(width: u32, height: u32) -> DecodedImage {
        DecodedImage::new(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))).unwrap()
    }

    #[test]
    fn test_dimensions_preserve_aspect() {
        assert_eq!(thumbnail_dimensions(1000, 1600, 256), (160, 256));
        assert_eq!(thumbnail_dimensions(1600, 1000, 256), (256, 160));
        assert_eq!(thumbnail_dimensions(999, 1000, 100), (100, 100));
        assert_eq!(thumbnail_dimensions(3000, 10, 256), (256, 1));
    }

    #[test]
    fn test_dimensions_never_upscale() {
        assert_eq!(thumbnail_dimensions(120, 80, 256), (120, 80));
        assert_eq!(thumbnail_dimensions(256, 256, 256), (256, 256));
    }

    #[test]
    fn test_dimensions_stay_within_bound() {
        for (w, h) in [(1, 5000), (4999, 5000), (7, 3), (1024, 1025), (65535, 2)] {
            for max in [1, 2, 17, 256] {
                let (tw, th) = thumbnail_dimensions(w, h, max);
                assert!(tw >= 1 && th >= 1);
                assert!(tw <= max && th <= max, "{w}x{h} @ {max}");
            }
        }
    }

    #[test]
    fn test_make_thumbnail() {
        let page = solid(400, 640);
        let thumb = make_thumbnail(&page, 64);
        assert_eq!(thumb.dimensions(), (40, 64));
        assert_eq!(thumb.pixels().get_pixel(20, 32), &Rgba([10, 20, 30, 255]));

        let small = solid(30, 20);
        assert_eq!(make_thumbnail(&small, 64), small);
    }

    #[tokio::test]
    async fn test_thumbnail_off_thread() {
        let thumb = thumbnail_off_thread(Arc::new(solid(300, 100)), 30, "p1.png")
            .await
            .unwrap();
        assert_eq!(thumb.dimensions(), (30, 10));
    }
}
