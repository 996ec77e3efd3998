//! Versioned model definition bundle: vocabulary, shape constants, and class catalog.
//!
//! A definition is loaded once, validated, and then shared read-only (behind
//! an `Arc`) by every pipeline component. Several definitions can coexist, one
//! per deployed model version.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::CoreError;
use crate::tokenize::is_normalized_word;

/// Vocabulary code. `0` is reserved for padding and never assigned to a word.
pub type Code = u32;

/// Padding sentinel written in front of short inputs.
pub const PAD_CODE: Code = 0;

/// Bytes per engine output score (a native-endian f32).
pub const SCORE_SIZE: usize = 4;

const BUILTIN_DEFINITION: &str = include_str!("../definitions/pandapp-t4.json");

/// Element type written into the engine's input buffer.
///
/// Both encodings use 4 native-endian bytes per element but are not
/// interchangeable: the trained model dictates which one it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputEncoding {
    #[default]
    Float32,
    Int32,
}

impl InputEncoding {
    /// Bytes per encoded element.
    pub const ELEMENT_SIZE: usize = 4;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Int32 => "int32",
        }
    }

    /// Largest code this encoding represents exactly.
    pub fn max_code(&self) -> Code {
        match self {
            // f32 has a 24-bit significand.
            Self::Float32 => 1 << f32::MANTISSA_DIGITS,
            Self::Int32 => i32::MAX as Code,
        }
    }
}

/// What the encoder does with more codes than the model's input width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverflowPolicy {
    /// Reject the request with a sizing error.
    #[default]
    Reject,
    /// Keep the leading `input_width` codes.
    KeepFirst,
    /// Keep the trailing `input_width` codes.
    KeepLast,
}

/// Immutable word → code table.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    codes: HashMap<String, Code>,
}

impl Vocabulary {
    /// Build a vocabulary, rejecting empty tables, the padding code,
    /// duplicate codes, and words the tokenizer could never produce.
    pub fn new(codes: HashMap<String, Code>) -> Result<Self, CoreError> {
        if codes.is_empty() {
            return Err(CoreError::Config("vocabulary is empty".into()));
        }

        let mut seen = HashSet::with_capacity(codes.len());
        for (word, &code) in &codes {
            if code == PAD_CODE {
                return Err(CoreError::Config(format!(
                    "word {word:?} uses reserved code {PAD_CODE}"
                )));
            }
            if !seen.insert(code) {
                return Err(CoreError::Config(format!("code {code} assigned twice")));
            }
            if !is_normalized_word(word) {
                return Err(CoreError::Config(format!(
                    "vocabulary word {word:?} is not normalized"
                )));
            }
        }

        Ok(Self { codes })
    }

    /// Code for a normalized word, if known.
    pub fn code(&self, word: &str) -> Option<Code> {
        self.codes.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Highest assigned code.
    pub fn max_code(&self) -> Code {
        self.codes.values().copied().max().unwrap_or(PAD_CODE)
    }

    /// Words sorted by code.
    pub fn sorted(&self) -> Vec<(&str, Code)> {
        let mut entries: Vec<(&str, Code)> =
            self.codes.iter().map(|(w, &c)| (w.as_str(), c)).collect();
        entries.sort_by_key(|&(_, c)| c);
        entries
    }
}

/// Fixed per-model shape constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelShape {
    pub input_width: usize,
    pub output_width: usize,
    /// Minimum score a class must reach to be selected.
    pub acceptance_threshold: f32,
}

impl ModelShape {
    pub fn new(
        input_width: usize,
        output_width: usize,
        acceptance_threshold: f32,
    ) -> Result<Self, CoreError> {
        if input_width == 0 {
            return Err(CoreError::Config("inputSize must be positive".into()));
        }
        if output_width == 0 {
            return Err(CoreError::Config("outputSize must be positive".into()));
        }
        if !acceptance_threshold.is_finite() {
            return Err(CoreError::Config(format!(
                "acceptedThreshold must be finite, got {acceptance_threshold}"
            )));
        }
        Ok(Self {
            input_width,
            output_width,
            acceptance_threshold,
        })
    }

    /// Size in bytes of the engine input buffer.
    pub fn input_bytes(&self) -> usize {
        self.input_width * InputEncoding::ELEMENT_SIZE
    }

    /// Size in bytes of the engine output buffer.
    pub fn output_bytes(&self) -> usize {
        self.output_width * SCORE_SIZE
    }
}

/// Positional mapping from engine output index to class id, plus the
/// canned response for each id.
#[derive(Debug, Clone)]
pub struct ClassCatalog {
    ids: Vec<String>,
    responses: HashMap<String, String>,
}

impl ClassCatalog {
    pub fn new(ids: Vec<String>, responses: HashMap<String, String>) -> Result<Self, CoreError> {
        if ids.is_empty() {
            return Err(CoreError::Config("class catalog is empty".into()));
        }
        let mut seen = HashSet::with_capacity(ids.len());
        for id in &ids {
            if !seen.insert(id.as_str()) {
                return Err(CoreError::Config(format!("class id {id} listed twice")));
            }
            if !responses.contains_key(id) {
                return Err(CoreError::Config(format!("class id {id} has no response")));
            }
        }
        Ok(Self { ids, responses })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Class id at an output index.
    pub fn id(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(String::as_str)
    }

    /// Response text for the class at an output index.
    pub fn response(&self, index: usize) -> Option<&str> {
        self.id(index)
            .and_then(|id| self.responses.get(id))
            .map(String::as_str)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

/// On-disk JSON layout of a model definition.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDefinition {
    name: String,
    input_size: usize,
    output_size: usize,
    accepted_threshold: f32,
    #[serde(default)]
    input_encoding: InputEncoding,
    #[serde(default)]
    overflow: OverflowPolicy,
    vocabulary: HashMap<String, Code>,
    class_ids: Vec<String>,
    responses: HashMap<String, String>,
}

/// A validated model definition.
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    pub name: String,
    pub shape: ModelShape,
    pub vocabulary: Vocabulary,
    pub catalog: ClassCatalog,
    pub input_encoding: InputEncoding,
    pub overflow: OverflowPolicy,
}

impl ModelDefinition {
    /// Assemble a definition from already-validated parts, checking that the
    /// catalog length matches the model's output width and that every code
    /// fits the input encoding.
    pub fn new(
        name: impl Into<String>,
        shape: ModelShape,
        vocabulary: Vocabulary,
        catalog: ClassCatalog,
        input_encoding: InputEncoding,
        overflow: OverflowPolicy,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::Config("model name is empty".into()));
        }
        if catalog.len() != shape.output_width {
            return Err(CoreError::Config(format!(
                "outputSize is {} but {} class ids are listed",
                shape.output_width,
                catalog.len()
            )));
        }
        let max_code = vocabulary.max_code();
        if max_code > input_encoding.max_code() {
            return Err(CoreError::Config(format!(
                "code {max_code} cannot be represented exactly as {}",
                input_encoding.as_str()
            )));
        }
        Ok(Self {
            name,
            shape,
            vocabulary,
            catalog,
            input_encoding,
            overflow,
        })
    }

    /// Parse and validate a definition from JSON.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let raw: RawDefinition = serde_json::from_str(json)?;
        let shape = ModelShape::new(raw.input_size, raw.output_size, raw.accepted_threshold)?;
        let vocabulary = Vocabulary::new(raw.vocabulary)?;
        let catalog = ClassCatalog::new(raw.class_ids, raw.responses)?;
        Self::new(
            raw.name,
            shape,
            vocabulary,
            catalog,
            raw.input_encoding,
            raw.overflow,
        )
    }

    /// Load a definition file from disk.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(CoreError::DefinitionNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        let def = Self::from_json(&json)?;
        info!(
            name = %def.name,
            input_width = def.shape.input_width,
            output_width = def.shape.output_width,
            words = def.vocabulary.len(),
            path = %path.display(),
            "loaded model definition"
        );
        Ok(def)
    }

    /// The bundled `PandApp-T4` definition.
    pub fn builtin() -> Result<Self, CoreError> {
        Self::from_json(BUILTIN_DEFINITION)
    }
}
