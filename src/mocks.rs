use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::prelude::*;

use crate::config::MODEL_INPUT_SIZE;
use crate::errors::{CropSegError, Result};
use crate::traits::SegmentationModel;

/// Segmentation model stand-in that returns a fixed probability mask.
#[derive(Debug)]
pub struct MockSegmentationModel {
    mask: Array4<f32>,
    calls: AtomicUsize,
}

impl MockSegmentationModel {
    /// Returns `mask` (shape `(1, H, W, 1)`) for every input.
    pub fn new(mask: Array4<f32>) -> Self {
        Self {
            mask,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every cell has probability `p`.
    pub fn uniform(p: f32) -> Self {
        let size = MODEL_INPUT_SIZE as usize;
        Self::new(Array4::from_elem((1, size, size, 1), p))
    }

    /// A `side x side` block at 0.9 in the top-left corner, 0.1 elsewhere.
    pub fn corner_block(side: usize) -> Self {
        let size = MODEL_INPUT_SIZE as usize;
        let side = side.min(size);
        let mut mask = Array4::from_elem((1, size, size, 1), 0.1);
        mask.slice_mut(s![0, ..side, ..side, 0]).fill(0.9);
        Self::new(mask)
    }

    /// Number of `predict` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SegmentationModel for MockSegmentationModel {
    fn predict(&self, tensor: ArrayView4<f32>) -> Result<ArrayD<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let size = MODEL_INPUT_SIZE as usize;
        if tensor.shape() != [1, size, size, 3] {
            return Err(CropSegError::inference(format!(
                "unexpected input shape {:?}",
                tensor.shape()
            )));
        }
        Ok(self.mask.clone().into_dyn())
    }
}
