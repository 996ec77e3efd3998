//! Inference engine seam.
//!
//! An engine is a black box from a fixed-size native-endian input buffer to a
//! fixed-size native-endian f32 output buffer. The engine value *is* the
//! handle: it is opened for one call and released when dropped, so every exit
//! path (including errors) gives the native resources back.

use std::path::{Path, PathBuf};

use intentbox_core::ModelDefinition;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("failed to load model {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("input buffer is {actual} bytes, model expects {expected}")]
    InputSize { actual: usize, expected: usize },

    #[error("output buffer is {actual} bytes, model produces {expected}")]
    OutputSize { actual: usize, expected: usize },

    #[error("inference failed: {0}")]
    Run(String),
}

/// A loaded model, valid for the duration of one prediction.
pub trait InferenceEngine {
    /// Run the model over `input`, filling `output` completely.
    fn run(&mut self, input: &[u8], output: &mut [u8]) -> Result<(), EngineError>;
}

/// Opens engine handles for a model file.
pub trait EngineFactory: Send + Sync {
    type Engine: InferenceEngine;

    fn open(
        &self,
        model_path: &Path,
        definition: &ModelDefinition,
    ) -> Result<Self::Engine, EngineError>;
}
