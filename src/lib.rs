pub mod config;
pub mod diagnosis;
pub mod errors;
pub mod image_processor;
pub mod knowledge;
pub mod metrics;
pub mod model;
pub mod overlay;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod progress_tracker;
pub mod traits;

pub mod mocks;

pub use config::{AreaMethod, Config, PipelineConfig, MASK_THRESHOLD, MODEL_INPUT_SIZE};
pub use diagnosis::{CropLabel, Diagnoser, Diagnosis, DiseaseLabel};
pub use errors::{CropSegError, Result};
pub use image_processor::{ImageProcessor, ImageReport};
pub use knowledge::{HealthyAdvice, InMemoryKnowledgeBase, InfectedAdvice, KnowledgeData};
pub use metrics::{compute_metrics, compute_metrics_with, Metrics};
pub use model::Model;
pub use overlay::{render_overlay, OverlayRenderer};
pub use pipeline::{SegmentationPipeline, SegmentationResult};
pub use postprocess::{postprocess, BinaryMask};
pub use preprocess::{decode_image, open_image, preprocess, SourceImage};
pub use progress_tracker::{BatchSummary, ProgressTracker};
pub use traits::*;
