//! ONNX Runtime engine for fixed-width intent classifiers.
//!
//! The model takes a single `[1, input_width]` tensor (f32 or i32, per the
//! definition's input encoding) and yields `[1, output_width]` f32 scores.

use std::path::{Path, PathBuf};

use intentbox_core::{InputEncoding, ModelDefinition, SCORE_SIZE};
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use crate::engine::{EngineError, EngineFactory, InferenceEngine};

/// Opens a fresh [`OnnxEngine`] for every prediction.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxEngineFactory;

impl EngineFactory for OnnxEngineFactory {
    type Engine = OnnxEngine;

    fn open(
        &self,
        model_path: &Path,
        definition: &ModelDefinition,
    ) -> Result<OnnxEngine, EngineError> {
        OnnxEngine::load(model_path, definition)
    }
}

/// An ONNX Runtime session sized for one model definition.
pub struct OnnxEngine {
    session: Session,
    path: PathBuf,
    input_width: usize,
    output_width: usize,
    encoding: InputEncoding,
}

impl OnnxEngine {
    /// Load a model file, sized against `definition`.
    pub fn load(model_path: &Path, definition: &ModelDefinition) -> Result<Self, EngineError> {
        if !model_path.exists() {
            return Err(EngineError::ModelNotFound(model_path.to_path_buf()));
        }

        let session = build_session(model_path).map_err(|e| EngineError::Load {
            path: model_path.to_path_buf(),
            reason: format!("{e:#}"),
        })?;

        debug!(model = %model_path.display(), "opened onnx session");
        Ok(Self {
            session,
            path: model_path.to_path_buf(),
            input_width: definition.shape.input_width,
            output_width: definition.shape.output_width,
            encoding: definition.input_encoding,
        })
    }

    fn infer(&mut self, input: &[u8]) -> anyhow::Result<Vec<f32>> {
        let shape = [1i64, self.input_width as i64];
        let elements = input.chunks_exact(InputEncoding::ELEMENT_SIZE);

        let outputs = match self.encoding {
            InputEncoding::Float32 => {
                let data: Vec<f32> = elements
                    .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                let tensor = Tensor::from_array((shape, data.into_boxed_slice()))?;
                self.session.run(ort::inputs![tensor])?
            }
            InputEncoding::Int32 => {
                let data: Vec<i32> = elements
                    .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                let tensor = Tensor::from_array((shape, data.into_boxed_slice()))?;
                self.session.run(ort::inputs![tensor])?
            }
        };

        let (_, scores) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(scores.to_vec())
    }
}

impl InferenceEngine for OnnxEngine {
    fn run(&mut self, input: &[u8], output: &mut [u8]) -> Result<(), EngineError> {
        let expected_in = self.input_width * InputEncoding::ELEMENT_SIZE;
        if input.len() != expected_in {
            return Err(EngineError::InputSize {
                actual: input.len(),
                expected: expected_in,
            });
        }
        let expected_out = self.output_width * SCORE_SIZE;
        if output.len() != expected_out {
            return Err(EngineError::OutputSize {
                actual: output.len(),
                expected: expected_out,
            });
        }

        let scores = self
            .infer(input)
            .map_err(|e| EngineError::Run(format!("{}: {e:#}", self.path.display())))?;
        if scores.len() != self.output_width {
            return Err(EngineError::Run(format!(
                "model produced {} scores, expected {}",
                scores.len(),
                self.output_width
            )));
        }

        for (slot, score) in output.chunks_exact_mut(SCORE_SIZE).zip(&scores) {
            slot.copy_from_slice(&score.to_ne_bytes());
        }
        Ok(())
    }
}

fn build_session(model_path: &Path) -> anyhow::Result<Session> {
    Ok(Session::builder()?.commit_from_file(model_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("PandApp-T4.onnx")
    }

    #[test]
    fn missing_model_file() {
        let def = ModelDefinition::builtin().unwrap();
        let err = OnnxEngine::load(Path::new("/nonexistent/model.onnx"), &def)
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::ModelNotFound(_)));
    }

    #[test]
    fn malformed_model_file_is_load_error() {
        let def = ModelDefinition::builtin().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.onnx");
        std::fs::write(&path, b"definitely not a protobuf").unwrap();
        let err = OnnxEngine::load(&path, &def).err().unwrap();
        assert!(matches!(err, EngineError::Load { .. }), "got {err:?}");
    }

    #[test]
    fn scores_question_when_model_present() {
        let path = model_path();
        if !path.exists() {
            eprintln!("skipping: {} not present", path.display());
            return;
        }
        let def = ModelDefinition::builtin().unwrap();
        let mut engine = OnnxEngine::load(&path, &def).unwrap();
        let input = intentbox_core::encode_text("What is the index of a dataframe?", &def)
            .unwrap()
            .to_bytes(def.input_encoding);
        let mut output = vec![0u8; def.shape.output_bytes()];
        engine.run(&input, &mut output).unwrap();

        let bad = vec![0u8; 3];
        let err = engine.run(&bad, &mut output).unwrap_err();
        assert!(matches!(err, EngineError::InputSize { actual: 3, expected: 28 }));
    }
}
