//! Core types for intentbox: model definitions, tokenizer, fixed-width encoder,
//! decision decoder, and the model acquisition state machine.

mod error;
pub use error::CoreError;

pub mod acquisition;
pub mod decode;
pub mod encode;
pub mod model;
pub mod tokenize;

pub use acquisition::{
    AcquisitionSnapshot, AcquisitionState, AcquisitionTracker, StatusCode, StatusUpdate,
};
pub use decode::{Decision, ScoreVector, decode};
pub use encode::{EncodedInput, encode, encode_text};
pub use model::{
    ClassCatalog, Code, InputEncoding, ModelDefinition, ModelShape, OverflowPolicy, PAD_CODE,
    SCORE_SIZE, Vocabulary,
};
pub use tokenize::tokenize;
