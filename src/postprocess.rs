use image::{GrayImage, Luma};
use ndarray::prelude::*;
use tracing::debug;

use crate::config::MASK_THRESHOLD;
use crate::errors::{CropSegError, Result};

/// Per-pixel defect classification. Every cell is exactly `0` or `1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    cells: GrayImage,
}

impl BinaryMask {
    /// An all-zero mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            cells: GrayImage::new(width, height),
        }
    }

    /// Builds a mask from a predicate over `(x, y)`.
    pub fn from_fn<F>(width: u32, height: u32, mut is_defected: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        Self {
            cells: GrayImage::from_fn(width, height, |x, y| Luma([u8::from(is_defected(x, y))])),
        }
    }

    pub fn width(&self) -> u32 {
        self.cells.width()
    }

    pub fn height(&self) -> u32 {
        self.cells.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.cells.dimensions()
    }

    pub fn is_defected(&self, x: u32, y: u32) -> bool {
        self.cells.get_pixel(x, y)[0] == 1
    }

    /// Number of defected cells.
    pub fn foreground_count(&self) -> u64 {
        self.cells.as_raw().iter().map(|&v| u64::from(v)).sum()
    }

    /// Borrow the mask as a greyscale image with values 0 and 1.
    pub fn as_image(&self) -> &GrayImage {
        &self.cells
    }

    /// `(height, width)` array of 0/1 values.
    pub fn to_array(&self) -> Array2<u8> {
        let (w, h) = self.dimensions();
        Array2::from_shape_vec((h as usize, w as usize), self.cells.as_raw().clone())
            .unwrap_or_else(|_| Array2::zeros((h as usize, w as usize)))
    }

    /// The mask reinterpreted as a probability map, for feeding back into
    /// [`postprocess`].
    pub fn to_probabilities(&self) -> Array2<f32> {
        self.to_array().mapv(f32::from)
    }

    /// A viewable 0/255 rendition of the mask.
    pub fn to_visible(&self) -> GrayImage {
        let mut visible = self.cells.clone();
        visible.pixels_mut().for_each(|p| p[0] *= 255);
        visible
    }
}

/// Drops singleton axes from both ends until only `(H, W)` remains.
///
/// Both `(1, H, W, 1)` (NHWC) and `(1, 1, H, W)` (NCHW) collapse to `(H, W)`.
fn squeeze_to_2d(mask: ArrayViewD<'_, f32>) -> Result<ArrayView2<'_, f32>> {
    let original_shape = mask.shape().to_vec();
    let mut view = mask;

    while view.ndim() > 2 {
        if view.shape()[0] == 1 {
            view = view.index_axis_move(Axis(0), 0);
        } else if view.shape()[view.ndim() - 1] == 1 {
            let last = view.ndim() - 1;
            view = view.index_axis_move(Axis(last), 0);
        } else {
            break;
        }
    }

    view.into_dimensionality::<Ix2>()
        .map_err(|_| CropSegError::InvalidMask {
            shape: original_shape,
        })
}

/// Thresholds a raw probability mask into a [`BinaryMask`].
///
/// A cell is defected when its probability is strictly greater than 0.5.
pub fn postprocess(mask: ArrayViewD<'_, f32>) -> Result<BinaryMask> {
    let mask = squeeze_to_2d(mask)?;
    let (height, width) = mask.dim();

    let cells = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([u8::from(mask[[y as usize, x as usize]] > MASK_THRESHOLD)])
    });

    let binary = BinaryMask { cells };
    debug!(
        width,
        height,
        defected = binary.foreground_count(),
        "thresholded probability mask"
    );
    Ok(binary)
}
