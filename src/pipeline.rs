use image::{DynamicImage, RgbImage};
use tracing::debug;

use crate::config::{PipelineConfig, MODEL_INPUT_SIZE};
use crate::errors::{CropSegError, Result};
use crate::metrics::{compute_metrics_with, Metrics};
use crate::overlay::OverlayRenderer;
use crate::postprocess::{postprocess, BinaryMask};
use crate::preprocess::preprocess;
use crate::traits::SegmentationModel;

/// Everything one segmentation run produces.
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    pub overlay: RgbImage,
    pub mask: BinaryMask,
    pub metrics: Metrics,
}

impl SegmentationResult {
    pub fn disease_percentage(&self) -> f64 {
        self.metrics.disease_percentage
    }

    pub fn defection_ratio(&self) -> f64 {
        self.metrics.defection_ratio
    }
}

/// Stateless preprocess -> infer -> postprocess -> {metrics, overlay} chain.
///
/// The pipeline holds configuration only; the model is lent per call so it can
/// be loaded once and reused.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentationPipeline {
    renderer: OverlayRenderer,
    config: PipelineConfig,
}

impl SegmentationPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            renderer: OverlayRenderer::new(config.blur_sigma)?,
            config,
        })
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run<M>(&self, image: &DynamicImage, model: &M) -> Result<SegmentationResult>
    where
        M: SegmentationModel + ?Sized,
    {
        let tensor = preprocess(image)?;
        let probabilities = model
            .predict(tensor.view())
            .map_err(CropSegError::inference)?;
        debug!(shape = ?probabilities.shape(), "received probability mask");

        let mask = postprocess(probabilities.view())?;
        if mask.dimensions() != (MODEL_INPUT_SIZE, MODEL_INPUT_SIZE) {
            return Err(CropSegError::InvalidMask {
                shape: probabilities.shape().to_vec(),
            });
        }

        let metrics = compute_metrics_with(&mask, self.config.area_method);
        let overlay = self.renderer.render(image, &mask)?;

        Ok(SegmentationResult {
            overlay,
            mask,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AreaMethod;
    use crate::mocks::MockSegmentationModel;
    use crate::overlay::HIGHLIGHT;
    use image::{Rgb, RgbImage};
    use ndarray::prelude::*;

    fn leaf(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 140, 40])))
    }

    #[test]
    fn test_corner_block_end_to_end() -> Result<()> {
        let model = MockSegmentationModel::corner_block(16);
        let result = SegmentationPipeline::default().run(&leaf(256, 256), &model)?;

        assert_eq!(result.mask.foreground_count(), 256);
        assert_eq!(result.metrics.defected_area, 256.0);
        assert!((result.disease_percentage() - 256.0 / 65536.0 * 100.0).abs() < 1e-9);
        assert!((result.defection_ratio() - 256.0 / (65536.0 - 256.0)).abs() < 1e-12);
        assert_eq!(result.overlay.dimensions(), (256, 256));
        assert_eq!(*result.overlay.get_pixel(3, 3), HIGHLIGHT);
        assert_ne!(*result.overlay.get_pixel(100, 100), HIGHLIGHT);
        assert_eq!(model.calls(), 1);
        Ok(())
    }

    #[test]
    fn test_full_mask_returns_infinite_ratio() -> Result<()> {
        let model = MockSegmentationModel::uniform(0.8);
        let result = SegmentationPipeline::default().run(&leaf(64, 48), &model)?;

        assert_eq!(result.disease_percentage(), 100.0);
        assert_eq!(result.defection_ratio(), f64::INFINITY);
        assert!(result.metrics.finite_defection_ratio().is_err());
        Ok(())
    }

    #[test]
    fn test_closure_as_model() -> Result<()> {
        let infer = |tensor: ArrayView4<f32>| -> Result<ArrayD<f32>> {
            assert_eq!(tensor.shape(), &[1, 256, 256, 3]);
            Ok(Array2::<f32>::zeros((256, 256)).into_dyn())
        };
        let result = SegmentationPipeline::default().run(&leaf(10, 10), &infer)?;
        assert_eq!(result.disease_percentage(), 0.0);
        assert_eq!(result.defection_ratio(), 0.0);
        Ok(())
    }

    #[test]
    fn test_inference_failure_propagates() {
        let infer = |_: ArrayView4<f32>| -> Result<ArrayD<f32>> {
            Err(CropSegError::inference("weights not loaded"))
        };
        assert!(matches!(
            SegmentationPipeline::default().run(&leaf(10, 10), &infer),
            Err(CropSegError::InferenceFailure { .. })
        ));
    }

    #[test]
    fn test_wrong_mask_size_is_rejected() {
        let infer =
            |_: ArrayView4<f32>| -> Result<ArrayD<f32>> { Ok(Array4::<f32>::zeros((1, 128, 128, 1)).into_dyn()) };
        match SegmentationPipeline::default().run(&leaf(10, 10), &infer) {
            Err(CropSegError::InvalidMask { shape }) => assert_eq!(shape, vec![1, 128, 128, 1]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_pixel_count_method() -> Result<()> {
        let pipeline = SegmentationPipeline::new(PipelineConfig {
            area_method: AreaMethod::PixelCount,
            ..PipelineConfig::default()
        })?;
        assert_eq!(pipeline.config().area_method, AreaMethod::PixelCount);

        let result = pipeline.run(&leaf(256, 256), &MockSegmentationModel::corner_block(16))?;
        assert_eq!(result.metrics.defected_area, 256.0);
        Ok(())
    }

    #[test]
    fn test_invalid_image_stops_before_inference() {
        let model = MockSegmentationModel::uniform(0.9);
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(
            SegmentationPipeline::default().run(&empty, &model),
            Err(CropSegError::InvalidImage { .. })
        ));
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_runs_are_independent() -> Result<()> {
        let pipeline = SegmentationPipeline::default();
        let model = MockSegmentationModel::corner_block(16);
        let first = pipeline.run(&leaf(256, 256), &model)?;
        let second = pipeline.run(&leaf(512, 300), &model)?;
        assert_eq!(first.metrics, second.metrics);
        assert_eq!(model.calls(), 2);
        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        assert!(SegmentationPipeline::new(PipelineConfig {
            blur_sigma: -2.0,
            ..PipelineConfig::default()
        })
        .is_err());
    }
}
