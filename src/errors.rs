use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for the crop disease segmentation pipeline.
///
/// Each variant carries the context of its failure domain (input image, mask shape,
/// inference, lookup, filesystem) so callers can branch on the kind of failure
/// without parsing messages. Nothing in the crate retries: every stage is a
/// deterministic transformation, so errors propagate straight to the caller.
#[derive(Error, Debug)]
pub enum CropSegError {
    #[error("Invalid image: {reason}")]
    InvalidImage { reason: String },

    #[error("Invalid probability mask: cannot reduce shape {shape:?} to a 2-D mask")]
    InvalidMask { shape: Vec<usize> },

    #[error("Inference failed")]
    InferenceFailure {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(
        "Degenerate mask: defected area {defected_area} covers the whole frame ({total_area}), defection ratio is unbounded"
    )]
    DegenerateMask { defected_area: f64, total_area: f64 },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },

    #[error("Lookup error: no {kind} entry for {key:?}")]
    Lookup { kind: String, key: String },
}

pub type Result<T> = std::result::Result<T, CropSegError>;

impl CropSegError {
    /// Wraps an arbitrary failure of the external inference capability.
    ///
    /// Errors that are already `InferenceFailure` pass through unchanged so the
    /// source chain doesn't nest the same variant twice.
    pub fn inference<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let boxed = err.into();
        match boxed.downcast::<CropSegError>() {
            Ok(inner) => match *inner {
                e @ CropSegError::InferenceFailure { .. } => e,
                other => CropSegError::InferenceFailure {
                    source: Box::new(other),
                },
            },
            Err(source) => CropSegError::InferenceFailure { source },
        }
    }
}

/// Convert anyhow errors to configuration errors.
///
/// Only the binary's setup code deals in anyhow; inside the library the
/// structured variants are used directly.
impl From<anyhow::Error> for CropSegError {
    fn from(err: anyhow::Error) -> Self {
        CropSegError::Configuration {
            message: err.to_string(),
        }
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Code that knows the path and operation should build `FileSystem` directly.
impl From<std::io::Error> for CropSegError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<image::ImageError> for CropSegError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

impl From<ort::Error> for CropSegError {
    fn from(err: ort::Error) -> Self {
        Self::Model {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Shape errors come out of tensor reshaping around inference, so they are
/// reported as model errors.
impl From<ndarray::ShapeError> for CropSegError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}

impl From<serde_json::Error> for CropSegError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration {
            message: format!("invalid JSON: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_wraps_foreign_errors() {
        let err = CropSegError::inference(std::io::Error::new(
            std::io::ErrorKind::Other,
            "session crashed",
        ));
        assert!(matches!(err, CropSegError::InferenceFailure { .. }));
        assert_eq!(err.to_string(), "Inference failed");
    }

    #[test]
    fn test_inference_does_not_double_wrap() {
        let inner = CropSegError::inference("backend gone");
        let outer = CropSegError::inference(inner);
        match outer {
            CropSegError::InferenceFailure { source } => {
                assert_eq!(source.to_string(), "backend gone");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_other_crate_errors_are_boxed_as_source() {
        let err = CropSegError::inference(CropSegError::InvalidImage {
            reason: "empty".to_string(),
        });
        match err {
            CropSegError::InferenceFailure { source } => {
                assert_eq!(source.to_string(), "Invalid image: empty");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
