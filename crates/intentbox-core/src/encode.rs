//! Fixed-width input encoding.
//!
//! Short code sequences are left-padded with [`PAD_CODE`]; the model was
//! trained on left-padded inputs, so signal always sits at the tail of the
//! buffer. Long sequences are handled by the definition's [`OverflowPolicy`].

use tracing::debug;

use crate::CoreError;
use crate::model::{Code, InputEncoding, ModelDefinition, OverflowPolicy, PAD_CODE};
use crate::tokenize::tokenize;

/// Exactly `input_width` codes, ready to be written into the engine buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInput {
    codes: Vec<Code>,
}

impl EncodedInput {
    pub fn codes(&self) -> &[Code] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Serialize as 4-byte native-endian elements of the given encoding.
    pub fn to_bytes(&self, encoding: InputEncoding) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.codes.len() * InputEncoding::ELEMENT_SIZE);
        for &code in &self.codes {
            match encoding {
                InputEncoding::Float32 => buf.extend_from_slice(&(code as f32).to_ne_bytes()),
                InputEncoding::Int32 => buf.extend_from_slice(&(code as i32).to_ne_bytes()),
            }
        }
        buf
    }
}

/// Fit a code sequence into exactly `width` slots.
pub fn encode(
    codes: &[Code],
    width: usize,
    overflow: OverflowPolicy,
) -> Result<EncodedInput, CoreError> {
    let fitted: &[Code] = if codes.len() <= width {
        codes
    } else {
        match overflow {
            OverflowPolicy::Reject => {
                return Err(CoreError::InputTooLong {
                    actual: codes.len(),
                    width,
                });
            }
            OverflowPolicy::KeepFirst => &codes[..width],
            OverflowPolicy::KeepLast => &codes[codes.len() - width..],
        }
    };

    let mut out = Vec::with_capacity(width);
    out.resize(width - fitted.len(), PAD_CODE);
    out.extend_from_slice(fitted);
    Ok(EncodedInput { codes: out })
}

/// Tokenize and encode a question against a model definition.
pub fn encode_text(text: &str, definition: &ModelDefinition) -> Result<EncodedInput, CoreError> {
    let codes = tokenize(text, &definition.vocabulary);
    let encoded = encode(&codes, definition.shape.input_width, definition.overflow)?;
    debug!(codes = ?encoded.codes(), "encoded input");
    Ok(encoded)
}
