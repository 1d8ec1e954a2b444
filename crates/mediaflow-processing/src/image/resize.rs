use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Bounding-box resize operations
pub struct ImageResize;

impl ImageResize {
    /// Largest size that fits inside the box while keeping the aspect ratio.
    ///
    /// Never returns dimensions larger than the original. A missing bound leaves that
    /// axis unconstrained.
    pub fn fit_within(
        orig_width: u32,
        orig_height: u32,
        max_width: Option<u32>,
        max_height: Option<u32>,
    ) -> (u32, u32) {
        if orig_width == 0 || orig_height == 0 {
            return (orig_width, orig_height);
        }

        let width_scale = max_width.map_or(1.0, |w| w as f64 / orig_width as f64);
        let height_scale = max_height.map_or(1.0, |h| h as f64 / orig_height as f64);
        let scale = width_scale.min(height_scale).min(1.0);

        if scale >= 1.0 {
            return (orig_width, orig_height);
        }

        let width = ((orig_width as f64 * scale).round() as u32).clamp(1, orig_width);
        let height = ((orig_height as f64 * scale).round() as u32).clamp(1, orig_height);
        (width, height)
    }

    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            FilterType::Triangle
        } else if max_ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        }
    }

    /// Shrink `img` to fit the box. Images already inside it are returned unchanged.
    pub fn resize_to_fit(
        img: DynamicImage,
        max_width: Option<u32>,
        max_height: Option<u32>,
    ) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        let (width, height) = Self::fit_within(orig_width, orig_height, max_width, max_height);

        if (width, height) == (orig_width, orig_height) {
            return img;
        }

        let filter = Self::select_filter(orig_width, orig_height, width, height);
        img.resize_exact(width, height, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn test_never_upscales() {
        assert_eq!(ImageResize::fit_within(100, 100, Some(500), None), (100, 100));
        assert_eq!(ImageResize::fit_within(100, 50, Some(500), Some(500)), (100, 50));
    }

    #[test]
    fn test_width_bound_keeps_aspect_ratio() {
        assert_eq!(ImageResize::fit_within(2000, 1000, Some(1280), None), (1280, 640));
    }

    #[test]
    fn test_height_bound_keeps_aspect_ratio() {
        assert_eq!(ImageResize::fit_within(1000, 2000, None, Some(500)), (250, 500));
    }

    #[test]
    fn test_both_bounds_use_tighter_one() {
        assert_eq!(ImageResize::fit_within(4000, 3000, Some(320), Some(320)), (320, 240));
        assert_eq!(ImageResize::fit_within(3000, 4000, Some(320), Some(320)), (240, 320));
    }

    #[test]
    fn test_extreme_aspect_ratio_keeps_one_pixel() {
        let (w, h) = ImageResize::fit_within(10_000, 2, Some(100), None);
        assert_eq!(w, 100);
        assert_eq!(h, 1);
    }

    #[test]
    fn test_resize_to_fit_small_image_untouched() {
        let img = create_test_image(100, 100);
        let resized = ImageResize::resize_to_fit(img, Some(500), None);
        assert_eq!(resized.dimensions(), (100, 100));
    }

    #[test]
    fn test_resize_to_fit_large_image() {
        let img = create_test_image(640, 480);
        let resized = ImageResize::resize_to_fit(img, Some(320), None);
        assert_eq!(resized.dimensions(), (320, 240));
    }

    #[test]
    fn test_select_filter() {
        assert_eq!(ImageResize::select_filter(1000, 1000, 100, 100), FilterType::Triangle);
        assert_eq!(ImageResize::select_filter(1000, 1000, 600, 600), FilterType::CatmullRom);
        assert_eq!(ImageResize::select_filter(1000, 1000, 900, 900), FilterType::Lanczos3);
    }
}
