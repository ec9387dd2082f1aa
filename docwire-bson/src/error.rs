//! Error types for binary doc decoding, encoding, and building.

use crate::value::ValueKind;
use thiserror::Error;

/// Errors that can occur while decoding, encoding, or building binary docs.
#[derive(Debug, Error)]
pub enum BsonError {
    #[error("unknown value kind tag: {0:#04x}")]
    UnknownKind(u8),

    #[error("no JSON representation for {0} value")]
    UnsupportedKind(ValueKind),

    #[error("document truncated at offset {offset}: need {needed} bytes, {remaining} remain")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("invalid declared length: {0}")]
    InvalidLength(i32),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("invalid element key: {0:?}")]
    InvalidKey(String),

    #[error("structural error: {0}")]
    Structural(String),

    #[error("unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BsonError {
    /// Returns whether this error indicates corrupt or hostile input
    /// (as opposed to a value the codec deliberately refuses to render).
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            BsonError::UnknownKind(_)
                | BsonError::Truncated { .. }
                | BsonError::InvalidLength(_)
                | BsonError::InvalidUtf8(_)
        )
    }
}
