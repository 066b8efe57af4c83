use clap::{Parser, ValueEnum};
use image::ImageFormat;
use std::path::PathBuf;

use crate::errors::{CropSegError, Result};

/// Side length of the square tensor the segmentation model consumes.
pub const MODEL_INPUT_SIZE: u32 = 256;

/// Probability above which a mask cell counts as defected.
pub const MASK_THRESHOLD: f32 = 0.5;

/// Default Gaussian sigma for the overlay backdrop.
pub const DEFAULT_BLUR_SIGMA: f32 = 10.0;

/// How the defected area is measured from a binary mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AreaMethod {
    /// Sum of convex-hull areas of the outer contours.
    #[default]
    Hull,
    /// Exact count of foreground cells.
    PixelCount,
}

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    pub input_dir: PathBuf,

    #[arg(default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(short, long)]
    pub model_path: PathBuf,

    #[arg(short, long, default_value = "png", value_parser = check_format)]
    pub format: String,

    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    #[arg(short, long, default_value_t = 0)]
    pub num_threads: usize,

    #[arg(long, default_value_t = DEFAULT_BLUR_SIGMA)]
    pub blur_sigma: f32,

    #[arg(long, value_enum, default_value_t = AreaMethod::Hull)]
    pub area_method: AreaMethod,

    #[arg(long, default_value = "report.json")]
    pub report_name: String,
}

impl Config {
    /// Checks the values clap cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if !self.input_dir.is_dir() {
            return Err(CropSegError::Validation {
                field: "input_dir".to_string(),
                reason: format!("{} is not a directory", self.input_dir.display()),
            });
        }
        if !self.model_path.is_file() {
            return Err(CropSegError::Validation {
                field: "model_path".to_string(),
                reason: format!("{} does not exist", self.model_path.display()),
            });
        }
        PipelineConfig::from(self).validate()
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_name)
    }
}

/// Per-call knobs of the segmentation pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub blur_sigma: f32,
    pub area_method: AreaMethod,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blur_sigma: DEFAULT_BLUR_SIGMA,
            area_method: AreaMethod::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        validate_sigma(self.blur_sigma)
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            blur_sigma: config.blur_sigma,
            area_method: config.area_method,
        }
    }
}

pub(crate) fn validate_sigma(sigma: f32) -> Result<()> {
    if sigma.is_finite() && sigma > 0.0 {
        Ok(())
    } else {
        Err(CropSegError::Validation {
            field: "blur_sigma".to_string(),
            reason: format!("must be a positive number, got {sigma}"),
        })
    }
}

fn check_format(s: &str) -> std::result::Result<String, String> {
    let supported: Vec<_> = ImageFormat::all()
        .filter(|f| f.writing_enabled())
        .flat_map(|f| f.extensions_str())
        .map(|s| format!("`{}`", s))
        .collect();
    let supported_message = format!("Supported formats: {}", supported.join(", "));

    let format = ImageFormat::from_extension(s)
        .ok_or(format!("{} is not supported. {}", s, supported_message))?;
    if !format.writing_enabled() {
        return Err(format!("{} is not supported. {}", s, supported_message));
    }

    Ok(s.to_string())
}
