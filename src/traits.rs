use crate::errors::Result;
use crate::knowledge::{HealthyAdvice, InfectedAdvice};
use image::DynamicImage;
use ndarray::prelude::*;

/// Segmentation inference capability: `(1, 256, 256, 3)` tensor in, probability
/// mask out.
///
/// Callers load the model once and lend it to every pipeline run. `predict`
/// takes `&self`; implementations that cannot run concurrently must serialise
/// internally (see [`crate::Model`]).
pub trait SegmentationModel: Send + Sync {
    /// Probability mask of shape `(1, H, W, 1)`, `(1, 1, H, W)` or `(H, W)`.
    fn predict(&self, tensor: ArrayView4<f32>) -> Result<ArrayD<f32>>;
}

/// Any inference function can stand in for a model.
impl<F> SegmentationModel for F
where
    F: Fn(ArrayView4<f32>) -> Result<ArrayD<f32>> + Send + Sync,
{
    fn predict(&self, tensor: ArrayView4<f32>) -> Result<ArrayD<f32>> {
        self(tensor)
    }
}

/// Image classification capability selected by model name.
pub trait Classifier: Send + Sync {
    fn classify(&self, model_name: &str, image: &DynamicImage) -> Result<String>;
}

/// Crop and disease advice store.
pub trait KnowledgeBase: Send + Sync {
    fn lookup_healthy(&self, crop_name: &str) -> Result<HealthyAdvice>;

    fn lookup_infected(&self, disease_name: &str) -> Result<InfectedAdvice>;
}
