//! Fast SIMD-accelerated image resizing.
//!
//! Uses fast_image_resize, which picks AVX2/NEON kernels when available.
//! Every reduction the engine performs goes through here: the 9×8 grayscale
//! grid for dHash, the 16×16 RGB grid for histograms, and the bounded
//! thumbnail the provider hands back.

use crate::error::HashError;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GrayImage, ImageBuffer, RgbImage};

/// Fast image resizer using SIMD acceleration
pub struct FastResizer {
    resizer: Resizer,
}

impl FastResizer {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    /// Convert to grayscale, then resize.
    ///
    /// Converting first keeps the resize to a single channel.
    pub fn resize_to_grayscale(
        &mut self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<GrayImage, HashError> {
        let gray = image.to_luma8();
        let (src_width, src_height) = gray.dimensions();
        let pixels = self.resize_raw(
            gray.into_raw(),
            (src_width, src_height),
            (width, height),
            PixelType::U8,
        )?;

        ImageBuffer::from_raw(width, height, pixels)
            .ok_or_else(|| HashError::ComputationFailed("grayscale buffer size mismatch".into()))
    }

    /// Resize keeping the three colour channels
    pub fn resize_to_rgb(
        &mut self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<RgbImage, HashError> {
        let rgb = image.to_rgb8();
        let (src_width, src_height) = rgb.dimensions();
        let pixels = self.resize_raw(
            rgb.into_raw(),
            (src_width, src_height),
            (width, height),
            PixelType::U8x3,
        )?;

        ImageBuffer::from_raw(width, height, pixels)
            .ok_or_else(|| HashError::ComputationFailed("rgb buffer size mismatch".into()))
    }

    fn resize_raw(
        &mut self,
        pixels: Vec<u8>,
        (src_width, src_height): (u32, u32),
        (width, height): (u32, u32),
        pixel_type: PixelType,
    ) -> Result<Vec<u8>, HashError> {
        if src_width == 0 || src_height == 0 {
            return Err(HashError::ComputationFailed(
                "invalid source dimensions".into(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(HashError::ComputationFailed(
                "invalid destination dimensions".into(),
            ));
        }

        let src_image = Image::from_vec_u8(src_width, src_height, pixels, pixel_type)
            .map_err(|e| HashError::ComputationFailed(format!("source image: {}", e)))?;
        let mut dst_image = Image::new(width, height, pixel_type);

        let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
        self.resizer
            .resize(&src_image, &mut dst_image, &options)
            .map_err(|e| HashError::ComputationFailed(format!("resize failed: {}", e)))?;

        Ok(dst_image.into_vec())
    }
}

impl Default for FastResizer {
    fn default() -> Self {
        Self::new()
    }
}

/// One-off grayscale reduction
pub fn resize_to_grayscale(
    image: &DynamicImage,
    width: u32,
    height: u32,
) -> Result<GrayImage, HashError> {
    FastResizer::new().resize_to_grayscale(image, width, height)
}

/// One-off RGB reduction
pub fn resize_to_rgb(image: &DynamicImage, width: u32, height: u32) -> Result<RgbImage, HashError> {
    FastResizer::new().resize_to_rgb(image, width, height)
}

/// Dimensions that fit within `max_edge`, preserving aspect ratio.
///
/// Never upscales; each side stays at least one pixel.
pub fn bounded_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge || max_edge == 0 {
        return (width, height);
    }
    let scale = max_edge as f64 / longest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_edge);
    (scaled(width), scaled(height))
}

/// Shrink an image so its longest edge is at most `max_edge`
pub fn bounded_thumbnail(image: DynamicImage, max_edge: u32) -> Result<DynamicImage, HashError> {
    let (width, height) = bounded_dimensions(image.width(), image.height(), max_edge);
    if (width, height) == (image.width(), image.height()) {
        return Ok(image);
    }
    Ok(DynamicImage::ImageRgb8(resize_to_rgb(&image, width, height)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            Rgb([r, g, 64])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn grayscale_reduction_has_requested_shape() {
        let resized = resize_to_grayscale(&create_test_image(200, 100), 9, 8).unwrap();
        assert_eq!(resized.dimensions(), (9, 8));
    }

    #[test]
    fn rgb_reduction_keeps_colour() {
        let red = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(40, 40, Rgb([250, 0, 0])));
        let resized = resize_to_rgb(&red, 16, 16).unwrap();
        assert_eq!(resized.dimensions(), (16, 16));
        assert!(resized.pixels().all(|p| p[0] > 240 && p[1] < 10));
    }

    #[test]
    fn empty_source_is_rejected() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(resize_to_grayscale(&empty, 9, 8).is_err());
    }

    #[test]
    fn resizer_reuse() {
        let mut resizer = FastResizer::new();
        let image = create_test_image(100, 100);
        let first = resizer.resize_to_grayscale(&image, 9, 8).unwrap();
        let second = resizer.resize_to_grayscale(&image, 9, 8).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn bounded_dimensions_only_shrink() {
        assert_eq!(bounded_dimensions(1024, 512, 256), (256, 128));
        assert_eq!(bounded_dimensions(100, 50, 256), (100, 50));
        assert_eq!(bounded_dimensions(5000, 1, 256), (256, 1));
    }

    #[test]
    fn thumbnail_fits_edge() {
        let thumb = bounded_thumbnail(create_test_image(600, 300), 256).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (256, 128));
    }
}
