use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, Luma, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::map::map_colors2;
use tracing::debug;

use crate::config::{validate_sigma, DEFAULT_BLUR_SIGMA};
use crate::errors::{CropSegError, Result};
use crate::postprocess::BinaryMask;

pub const HIGHLIGHT: Rgb<u8> = Rgb([255, 0, 0]);

/// Paints defected cells red over a blurred copy of the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayRenderer {
    blur_sigma: f32,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self {
            blur_sigma: DEFAULT_BLUR_SIGMA,
        }
    }
}

impl OverlayRenderer {
    pub fn new(blur_sigma: f32) -> Result<Self> {
        validate_sigma(blur_sigma)?;
        Ok(Self { blur_sigma })
    }

    pub const fn blur_sigma(&self) -> f32 {
        self.blur_sigma
    }

    /// The output always has the mask's dimensions; the original is resized
    /// to match.
    pub fn render(&self, original: &DynamicImage, mask: &BinaryMask) -> Result<RgbImage> {
        let (width, height) = mask.dimensions();
        if width == 0 || height == 0 {
            return Err(CropSegError::InvalidMask {
                shape: vec![height as usize, width as usize],
            });
        }
        let (src_w, src_h) = original.dimensions();
        if src_w == 0 || src_h == 0 {
            return Err(CropSegError::InvalidImage {
                reason: format!("zero spatial extent ({src_w}x{src_h})"),
            });
        }

        let resized = imageops::resize(&original.to_rgb8(), width, height, FilterType::CatmullRom);
        let backdrop = gaussian_blur_f32(&resized, self.blur_sigma);
        debug!(width, height, sigma = self.blur_sigma, "blurred overlay backdrop");

        Ok(map_colors2(&backdrop, mask.as_image(), |background, Luma([defected])| {
            if defected == 1 {
                HIGHLIGHT
            } else {
                background
            }
        }))
    }
}

/// [`OverlayRenderer::render`] with the default blur.
pub fn render_overlay(original: &DynamicImage, mask: &BinaryMask) -> Result<RgbImage> {
    OverlayRenderer::default().render(original, mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn checkerboard(size: u32, cell: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }))
    }

    #[test]
    fn test_output_is_mask_sized() -> Result<()> {
        let mask = BinaryMask::empty(256, 256);
        for (w, h) in [(1, 1), (37, 512), (1024, 768)] {
            let image = DynamicImage::ImageRgb8(RgbImage::new(w, h));
            assert_eq!(render_overlay(&image, &mask)?.dimensions(), (256, 256));
        }
        Ok(())
    }

    #[test]
    fn test_defected_cells_are_red() -> Result<()> {
        let mask = BinaryMask::from_fn(256, 256, |x, y| x < 16 && y < 16);
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 200, Rgb([10, 200, 30])));
        let overlay = render_overlay(&image, &mask)?;

        for (x, y, pixel) in overlay.enumerate_pixels() {
            if mask.is_defected(x, y) {
                assert_eq!(*pixel, HIGHLIGHT);
            } else {
                assert_ne!(*pixel, HIGHLIGHT);
            }
        }
        Ok(())
    }

    #[test]
    fn test_uniform_background_survives_blur() -> Result<()> {
        let mask = BinaryMask::from_fn(256, 256, |x, _| x >= 200);
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(256, 256, Rgb([40, 120, 60])));
        let overlay = render_overlay(&image, &mask)?;

        let close = |p: &Rgb<u8>, expected: [u8; 3]| {
            p.0.iter().zip(expected).all(|(&a, b)| a.abs_diff(b) <= 1)
        };
        assert!(close(overlay.get_pixel(10, 10), [40, 120, 60]));
        assert!(close(overlay.get_pixel(128, 250), [40, 120, 60]));
        assert_eq!(*overlay.get_pixel(220, 100), HIGHLIGHT);
        Ok(())
    }

    #[test]
    fn test_background_is_actually_blurred() -> Result<()> {
        let image = checkerboard(256, 4);
        let overlay = render_overlay(&image, &BinaryMask::empty(256, 256))?;

        // a 4px checkerboard under sigma 10 collapses towards mid grey
        let Rgb([r, g, b]) = *overlay.get_pixel(128, 128);
        assert!((100..=155).contains(&r), "red channel {r} not blurred");
        assert_eq!(r, g);
        assert_eq!(g, b);
        Ok(())
    }

    #[test]
    fn test_smaller_sigma_keeps_more_detail() -> Result<()> {
        let image = checkerboard(256, 8);
        let mask = BinaryMask::empty(256, 256);
        let sharp = OverlayRenderer::new(0.5)?.render(&image, &mask)?;
        let soft = OverlayRenderer::new(10.0)?.render(&image, &mask)?;

        let contrast = |img: &RgbImage| {
            let (lo, hi) = img
                .pixels()
                .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
            hi - lo
        };
        assert!(contrast(&sharp) > contrast(&soft));
        Ok(())
    }

    #[test]
    fn test_alpha_input_is_accepted() -> Result<()> {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(64, 64));
        let mask = BinaryMask::from_fn(256, 256, |x, y| x == y);
        let overlay = render_overlay(&image, &mask)?;
        assert_eq!(*overlay.get_pixel(7, 7), HIGHLIGHT);
        Ok(())
    }

    #[test]
    fn test_invalid_sigma_and_empty_inputs() {
        assert!(OverlayRenderer::new(0.0).is_err());

        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        assert!(matches!(
            render_overlay(&image, &BinaryMask::empty(0, 0)),
            Err(CropSegError::InvalidMask { .. })
        ));

        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(
            render_overlay(&empty, &BinaryMask::empty(4, 4)),
            Err(CropSegError::InvalidImage { .. })
        ));
    }
}
