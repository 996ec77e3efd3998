//! Decision decoding: raw score buffer → selected class → canned response.

use tracing::debug;

use crate::CoreError;
use crate::model::{ClassCatalog, ModelShape, SCORE_SIZE};

/// One score per class, in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector {
    scores: Vec<f32>,
}

impl ScoreVector {
    /// Reinterpret a native-endian f32 buffer of exactly `width` elements.
    pub fn from_ne_bytes(bytes: &[u8], width: usize) -> Result<Self, CoreError> {
        let expected = width * SCORE_SIZE;
        if bytes.len() != expected {
            return Err(CoreError::OutputSize {
                actual: bytes.len(),
                expected,
            });
        }
        let scores = bytes
            .chunks_exact(SCORE_SIZE)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { scores })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.scores
    }

    /// Index of the highest score that reaches `threshold`.
    ///
    /// Ties go to the lowest index. NaN scores never qualify.
    pub fn best_above(&self, threshold: f32) -> Option<usize> {
        select_index(&self.scores, threshold)
    }
}

impl From<Vec<f32>> for ScoreVector {
    fn from(scores: Vec<f32>) -> Self {
        Self { scores }
    }
}

/// Outcome of decoding one prediction.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Match {
        index: usize,
        class_id: String,
        response: String,
        score: f32,
    },
    /// No class reached the acceptance threshold.
    NoMatch,
}

impl Decision {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }

    pub fn response(&self) -> Option<&str> {
        match self {
            Self::Match { response, .. } => Some(response),
            Self::NoMatch => None,
        }
    }
}

/// First-max-wins argmax over scores `>= threshold`.
pub fn select_index(scores: &[f32], threshold: f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() || score < threshold {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Decode a raw engine output buffer against a model's shape and catalog.
///
/// An empty buffer is a no-match. A buffer of the wrong size is a request
/// error. A winning index without a catalog entry is a fatal desync.
pub fn decode(
    output: &[u8],
    shape: &ModelShape,
    catalog: &ClassCatalog,
) -> Result<Decision, CoreError> {
    if output.is_empty() {
        return Ok(Decision::NoMatch);
    }
    let scores = ScoreVector::from_ne_bytes(output, shape.output_width)?;
    debug!(scores = ?scores.as_slice(), "decoded scores");

    let Some(index) = scores.best_above(shape.acceptance_threshold) else {
        return Ok(Decision::NoMatch);
    };

    let (Some(class_id), Some(response)) = (catalog.id(index), catalog.response(index)) else {
        return Err(CoreError::CatalogMismatch { index });
    };

    Ok(Decision::Match {
        index,
        class_id: class_id.to_string(),
        response: response.to_string(),
        score: scores.as_slice()[index],
    })
}
