use std::io::Cursor;
use std::path::Path;

use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, ImageReader};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use tracing::debug;

use crate::config::MODEL_INPUT_SIZE;
use crate::errors::{CropSegError, Result};

/// A decoded image together with the container format it was read from.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: DynamicImage,
    pub format: Option<ImageFormat>,
}

impl SourceImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<SourceImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CropSegError::InvalidImage {
            reason: format!("cannot sniff image format: {e}"),
        })?;
    let format = reader.format();
    let image = reader.decode().map_err(|e| CropSegError::InvalidImage {
        reason: e.to_string(),
    })?;
    ensure_extent(&image)?;
    Ok(SourceImage { image, format })
}

pub fn open_image(path: &Path) -> Result<SourceImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| CropSegError::FileSystem {
            path: path.to_path_buf(),
            operation: "open image".to_string(),
            source: e,
        })?
        .with_guessed_format()
        .map_err(|e| CropSegError::FileSystem {
            path: path.to_path_buf(),
            operation: "sniff image format".to_string(),
            source: e,
        })?;
    let format = reader.format();
    let image = reader.decode().map_err(|e| CropSegError::InvalidImage {
        reason: format!("{}: {e}", path.display()),
    })?;
    ensure_extent(&image)?;
    Ok(SourceImage { image, format })
}

fn ensure_extent(image: &DynamicImage) -> Result<()> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(CropSegError::InvalidImage {
            reason: format!("zero spatial extent ({width}x{height})"),
        });
    }
    Ok(())
}

/// Builds the `(1, 256, 256, 3)` NHWC tensor the segmentation model expects.
///
/// The image is always converted to 8-bit RGB first, so grey and RGBA inputs
/// are accepted. Resampling is bicubic and intensities are scaled to `[0, 1]`.
pub fn preprocess(image: &DynamicImage) -> Result<Array4<f32>> {
    ensure_extent(image)?;

    let rgb = image.to_rgb8();
    let resized = imageops::resize(
        &rgb,
        MODEL_INPUT_SIZE,
        MODEL_INPUT_SIZE,
        FilterType::CatmullRom,
    );
    debug!(
        from = ?image.dimensions(),
        to = MODEL_INPUT_SIZE,
        "resized input image"
    );

    // (C, H, W) view -> (1, H, W, C)
    let tensor = resized
        .as_ndarray3()
        .permuted_axes([1, 2, 0])
        .insert_axis(Axis(0))
        .mapv(|v| f32::from(v) / 255.0);

    Ok(tensor.as_standard_layout().into_owned())
}
