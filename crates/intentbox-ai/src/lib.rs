//! Inference layer: engine seam, ONNX Runtime engine, and the prediction pipeline.

pub mod engine;
mod predictor;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::{OnnxEngine, OnnxEngineFactory};

pub use engine::{EngineError, EngineFactory, InferenceEngine};
pub use predictor::{Answer, EngineAccess, NO_ANSWER, PredictError, Predictor};
