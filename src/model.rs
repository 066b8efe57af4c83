use std::path::Path;

use ndarray::prelude::*;
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::{builder::SessionBuilder, Session};
use ort::value::TensorRef;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::MODEL_INPUT_SIZE;
use crate::errors::{CropSegError, Result};
use crate::traits::SegmentationModel;

/// U-Net leaf segmentation model exported to ONNX.
///
/// The session is loaded once and shared across pipeline runs. `Session::run`
/// needs exclusive access, so concurrent predictions are serialised by the mutex.
pub struct Model {
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

impl Model {
    pub fn new(model_path: &Path, num_threads: usize, device_id: i32) -> Result<Self> {
        let mut builder = SessionBuilder::new()
            .map_err(|e| CropSegError::Model {
                operation: "session builder init".to_string(),
                source: Box::new(e),
            })?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(|e| CropSegError::Model {
                operation: "execution provider setup".to_string(),
                source: Box::new(e),
            })?;

        if num_threads > 0 {
            builder = builder
                .with_intra_threads(num_threads)
                .map_err(|e| CropSegError::Model {
                    operation: "intra-op thread setup".to_string(),
                    source: Box::new(e),
                })?;
        }

        let mut session = builder
            .commit_from_file(model_path)
            .map_err(|e| CropSegError::Model {
                operation: format!("load model file: {}", model_path.display()),
                source: Box::new(e),
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| CropSegError::Model {
                operation: "read model inputs".to_string(),
                source: "model declares no inputs".into(),
            })?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| CropSegError::Model {
                operation: "read model outputs".to_string(),
                source: "model declares no outputs".into(),
            })?;

        // warm up
        let size = MODEL_INPUT_SIZE as usize;
        let data = Array4::<f32>::zeros((1, size, size, 3));
        session
            .run(ort::inputs![input_name.as_str() => TensorRef::from_array_view(&data)?])
            .map_err(|e| CropSegError::Model {
                operation: "warm-up run".to_string(),
                source: Box::new(e),
            })?;

        info!(
            path = %model_path.display(),
            input = %input_name,
            output = %output_name,
            "segmentation model loaded"
        );

        Ok(Self {
            input_name,
            output_name,
            session: Mutex::new(session),
        })
    }
}

impl SegmentationModel for Model {
    fn predict(&self, tensor: ArrayView4<f32>) -> Result<ArrayD<f32>> {
        let tensor = tensor.as_standard_layout();
        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => TensorRef::from_array_view(&tensor)?])
            .map_err(CropSegError::inference)?;

        let mask = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(CropSegError::inference)?
            .to_owned();
        debug!(shape = ?mask.shape(), "model produced mask");
        Ok(mask)
    }
}
