use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use rayon::ThreadPoolBuilder;
use tracing::{info, warn};

use crop_disease_seg::{Config, ImageProcessor, Model, ProgressTracker};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    config.validate()?;

    if config.num_threads > 0 {
        ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build_global()?;
    }

    let model = Model::new(&config.model_path, config.num_threads, config.device_id)
        .with_context(|| format!("Failed to load model: {}", config.model_path.display()))?;
    let processor = ImageProcessor::new(&config)?;
    let tracker = ProgressTracker::new(&config.input_dir)?;

    if tracker.image_paths().is_empty() {
        warn!(input_dir = %config.input_dir.display(), "no images found");
        return Ok(());
    }

    let summary = tracker.process_images(&processor, &model);

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;
    let report_path = config.report_path();
    summary.write_json(&report_path)?;

    info!(
        processed = summary.processed.len(),
        failed = summary.failed.len(),
        report = %report_path.display(),
        "batch finished"
    );

    Ok(())
}
