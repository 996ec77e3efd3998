//! Prediction pipeline: tokenize → encode → engine → decode.
//!
//! Each request owns its buffers. The engine handle is opened inside
//! [`Predictor::predict`] and dropped before decoding starts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use intentbox_core::{CoreError, Decision, ModelDefinition, decode, encode_text};
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::{EngineError, EngineFactory, InferenceEngine};

/// Shown when no class clears the acceptance threshold.
pub const NO_ANSWER: &str = "<--- Nothing --->";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("model file not found: {0} (fetch the model first)")]
    ModelMissing(PathBuf),

    #[error("inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("prediction task failed: {0}")]
    Task(String),
}

impl PredictError {
    /// Fatal errors mean the model definition itself is unusable; everything
    /// else only failed this one request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_fatal())
    }
}

/// Whether concurrent requests may call the engine at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineAccess {
    #[default]
    Concurrent,
    /// One engine call at a time. Tokenizing and decoding stay parallel.
    Serialized,
}

/// Runs predictions for one model definition.
pub struct Predictor<F> {
    definition: Arc<ModelDefinition>,
    factory: F,
    gate: Option<Mutex<()>>,
    timeout: Duration,
}

impl<F: EngineFactory> Predictor<F> {
    pub fn new(definition: Arc<ModelDefinition>, factory: F) -> Self {
        Self {
            definition,
            factory,
            gate: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_access(mut self, access: EngineAccess) -> Self {
        self.gate = match access {
            EngineAccess::Concurrent => None,
            EngineAccess::Serialized => Some(Mutex::new(())),
        };
        self
    }

    /// Upper bound for [`predict_async`](Self::predict_async).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    /// Answer one question with the model at `model_path`.
    pub fn predict(&self, model_path: &Path, text: &str) -> Result<Decision, PredictError> {
        if !model_path.exists() {
            return Err(PredictError::ModelMissing(model_path.to_path_buf()));
        }

        let def = &self.definition;
        let encoded = encode_text(text, def)?;
        let input = encoded.to_bytes(def.input_encoding);
        let output = self.invoke(model_path, &input)?;
        let decision = decode(&output, &def.shape, &def.catalog)?;

        match &decision {
            Decision::Match {
                index,
                class_id,
                score,
                ..
            } => info!(model = %def.name, index, class_id = %class_id, score, "matched"),
            Decision::NoMatch => info!(model = %def.name, "no class above threshold"),
        }
        Ok(decision)
    }

    fn invoke(&self, model_path: &Path, input: &[u8]) -> Result<Vec<u8>, EngineError> {
        let _guard = self
            .gate
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner));

        let mut engine = self.factory.open(model_path, &self.definition)?;
        let mut output = vec![0u8; self.definition.shape.output_bytes()];
        engine.run(input, &mut output)?;
        Ok(output)
    }
}

impl<F: EngineFactory + 'static> Predictor<F> {
    /// Run [`predict`](Self::predict) on the blocking pool, bounded by the
    /// configured timeout. A timed-out call keeps running to completion in
    /// the background; its result is discarded.
    pub async fn predict_async(
        self: &Arc<Self>,
        model_path: PathBuf,
        text: String,
    ) -> Result<Decision, PredictError> {
        let this = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || this.predict(&model_path, &text));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(PredictError::Task(join.to_string())),
            Err(_) => {
                warn!(timeout = ?self.timeout, "prediction timed out");
                Err(PredictError::Timeout(self.timeout))
            }
        }
    }
}

/// User-facing rendering of a prediction outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Response(String),
    Nothing,
    Unavailable(String),
}

impl Answer {
    pub fn from_result(result: &Result<Decision, PredictError>) -> Self {
        match result {
            Ok(Decision::Match { response, .. }) => Self::Response(response.clone()),
            Ok(Decision::NoMatch) => Self::Nothing,
            Err(e) => Self::Unavailable(e.to_string()),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(text) => f.write_str(text),
            Self::Nothing => f.write_str(NO_ANSWER),
            Self::Unavailable(reason) => write!(f, "could not answer: {reason}"),
        }
    }
}
