use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

use crate::errors::{CropSegError, Result};
use crate::image_processor::{ImageProcessor, ImageReport};
use crate::traits::SegmentationModel;

#[derive(Debug, Clone, Serialize)]
pub struct FailedImage {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a directory run, written out as the JSON report.
#[derive(Debug, Default, Serialize)]
pub struct BatchSummary {
    pub processed: Vec<ImageReport>,
    pub failed: Vec<FailedImage>,
}

impl BatchSummary {
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| CropSegError::FileSystem {
            path: path.to_path_buf(),
            operation: "write report".to_string(),
            source: e,
        })
    }
}

pub struct ProgressTracker {
    progress_bar: ProgressBar,
    image_paths: Vec<PathBuf>,
}

impl ProgressTracker {
    pub fn new(input_dir: &Path) -> Result<Self> {
        let mut image_paths: Vec<_> = WalkDir::new(input_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| image::ImageFormat::from_path(e.path()).is_ok_and(|f| f.reading_enabled()))
            .map(|e| e.into_path())
            .collect();
        image_paths.sort();

        let progress_bar = ProgressBar::new(image_paths.len() as u64);
        progress_bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .map_err(|e| CropSegError::Configuration {
                message: e.to_string(),
            })?
            .progress_chars("#>-"),
        );

        Ok(Self {
            progress_bar,
            image_paths,
        })
    }

    pub fn image_paths(&self) -> &[PathBuf] {
        &self.image_paths
    }

    /// Segments every collected image. Failures are logged and collected;
    /// they never abort the rest of the batch.
    pub fn process_images<M>(&self, image_processor: &ImageProcessor, model: &M) -> BatchSummary
    where
        M: SegmentationModel + ?Sized,
    {
        let failed = Mutex::new(Vec::new());

        let mut processed: Vec<ImageReport> = self
            .image_paths
            .par_iter()
            .progress_with(self.progress_bar.clone())
            .filter_map(|path| match image_processor.process_image(path, model) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to process image");
                    failed.lock().push(FailedImage {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                    None
                }
            })
            .collect();
        self.progress_bar.finish();

        processed.sort_by(|a, b| a.path.cmp(&b.path));
        let mut failed = failed.into_inner();
        failed.sort_by(|a, b| a.path.cmp(&b.path));

        BatchSummary { processed, failed }
    }
}
