use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use serde::Serialize;
use tracing::info;

use crate::config::{Config, PipelineConfig};
use crate::errors::{CropSegError, Result};
use crate::pipeline::SegmentationPipeline;
use crate::preprocess::open_image;
use crate::traits::SegmentationModel;

/// Per-image line of the batch report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReport {
    pub path: PathBuf,
    pub output: PathBuf,
    pub format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub defected_area: f64,
    pub total_area: f64,
    pub disease_percentage: f64,
    /// `None` when the whole frame is defected.
    pub defection_ratio: Option<f64>,
}

/// Runs the pipeline on files and writes the overlays under the output tree.
pub struct ImageProcessor {
    config: Config,
    pipeline: SegmentationPipeline,
}

impl ImageProcessor {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            pipeline: SegmentationPipeline::new(PipelineConfig::from(config))?,
        })
    }

    /// Where the overlay for `path` goes: same relative location under the
    /// output directory, with the configured extension.
    pub fn output_path(&self, path: &Path) -> Result<PathBuf> {
        let relative_path = path
            .strip_prefix(&self.config.input_dir)
            .map_err(|_| CropSegError::FileSystem {
                path: path.to_path_buf(),
                operation: "relative path".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "input file is outside the input directory",
                ),
            })?;
        Ok(self
            .config
            .output_dir
            .join(relative_path)
            .with_extension(&self.config.format))
    }

    fn output_format(&self) -> Result<ImageFormat> {
        ImageFormat::from_extension(&self.config.format)
            .filter(|format| format.writing_enabled())
            .ok_or_else(|| CropSegError::Validation {
                field: "format".to_string(),
                reason: format!("cannot write images as `{}`", self.config.format),
            })
    }

    pub fn process_image<M>(&self, path: &Path, model: &M) -> Result<ImageReport>
    where
        M: SegmentationModel + ?Sized,
    {
        let format = self.output_format()?;
        let source = open_image(path)?;
        let result = self.pipeline.run(&source.image, model)?;

        let output = self.output_path(path)?;
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| CropSegError::FileSystem {
                path: parent.to_path_buf(),
                operation: "create output directory".to_string(),
                source: e,
            })?;
        }

        result
            .overlay
            .save_with_format(&output, format)
            .map_err(|e| CropSegError::ImageProcessing {
                path: output.display().to_string(),
                operation: "save overlay".to_string(),
                source: Box::new(e),
            })?;

        let (width, height) = source.dimensions();
        let metrics = result.metrics;
        info!(
            path = %path.display(),
            disease_percentage = metrics.disease_percentage,
            defection_ratio = metrics.defection_ratio,
            "segmented"
        );

        Ok(ImageReport {
            path: path.to_path_buf(),
            output,
            format: source.format.map(|f| format!("{f:?}")),
            width,
            height,
            defected_area: metrics.defected_area,
            total_area: metrics.total_area,
            disease_percentage: metrics.disease_percentage,
            defection_ratio: metrics.finite_defection_ratio().ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockSegmentationModel;
    use clap::Parser;
    use image::{Rgb, RgbImage};
    use std::ffi::OsString;
    use tempfile::TempDir;

    fn config_for(input_dir: &Path, output_dir: &Path) -> Config {
        let args: Vec<OsString> = vec![
            "crop-disease-seg".into(),
            input_dir.as_os_str().to_owned(),
            output_dir.as_os_str().to_owned(),
            "-m".into(),
            "unet.onnx".into(),
        ];
        Config::parse_from(args)
    }

    #[test]
    fn test_relative_output_path() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let input_dir = temp_dir.path().join("input");
        let output_dir = temp_dir.path().join("output");
        let processor = ImageProcessor::new(&config_for(&input_dir, &output_dir))?;

        let output = processor.output_path(&input_dir.join("tomato/leaf_01.jpg"))?;
        assert_eq!(output, output_dir.join("tomato/leaf_01.png"));

        assert!(processor.output_path(Path::new("/elsewhere/leaf.jpg")).is_err());
        Ok(())
    }

    #[test]
    fn test_process_image_writes_overlay() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let input_dir = temp_dir.path().join("input");
        let output_dir = temp_dir.path().join("output");
        fs::create_dir_all(input_dir.join("potato"))?;

        let input = input_dir.join("potato/leaf.png");
        RgbImage::from_pixel(320, 240, Rgb([20, 160, 40])).save(&input)?;

        let processor = ImageProcessor::new(&config_for(&input_dir, &output_dir))?;
        let report = processor.process_image(&input, &MockSegmentationModel::corner_block(16))?;

        assert_eq!(report.output, output_dir.join("potato/leaf.png"));
        assert!(report.output.exists());
        assert_eq!((report.width, report.height), (320, 240));
        assert_eq!(report.format.as_deref(), Some("Png"));
        assert_eq!(report.defected_area, 256.0);

        let overlay = image::open(&report.output)?.to_rgb8();
        assert_eq!(overlay.dimensions(), (256, 256));
        Ok(())
    }

    #[test]
    fn test_unknown_output_format_is_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let input_dir = temp_dir.path().to_path_buf();
        let input = input_dir.join("leaf.png");
        RgbImage::new(16, 16).save(&input)?;

        let mut config = config_for(&input_dir, &temp_dir.path().join("out"));
        config.format = "leaf".to_string();
        let processor = ImageProcessor::new(&config)?;
        let model = MockSegmentationModel::uniform(0.0);

        assert!(matches!(
            processor.process_image(&input, &model),
            Err(CropSegError::Validation { .. })
        ));
        assert_eq!(model.calls(), 0);
        assert!(!temp_dir.path().join("out/leaf.leaf").exists());
        Ok(())
    }

    #[test]
    fn test_degenerate_ratio_is_reported_as_none() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let input_dir = temp_dir.path().to_path_buf();
        let input = input_dir.join("leaf.png");
        RgbImage::new(16, 16).save(&input)?;

        let processor = ImageProcessor::new(&config_for(&input_dir, &temp_dir.path().join("out")))?;
        let report = processor.process_image(&input, &MockSegmentationModel::uniform(1.0))?;
        assert_eq!(report.disease_percentage, 100.0);
        assert_eq!(report.defection_ratio, None);
        Ok(())
    }
}
