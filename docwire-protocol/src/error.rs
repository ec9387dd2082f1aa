//! Protocol error types.

use docwire_bson::BsonError;
use thiserror::Error;

/// Errors raised while framing or parsing wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame length: {0}")]
    MalformedLength(i32),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("payload truncated: need {needed} bytes at offset {offset}, {remaining} remain")]
    TruncatedPayload {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("namespace is not valid UTF-8")]
    BadNamespace,

    #[error("BSON error: {0}")]
    Bson(#[from] BsonError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the error poisons the whole connection (framing is lost)
    /// rather than just the current message's payload.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedLength(_)
                | ProtocolError::FrameTooLarge { .. }
                | ProtocolError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::MalformedLength(-3);
        assert!(err.to_string().contains("-3"));

        let err = ProtocolError::FrameTooLarge {
            size: 100,
            max: 50,
        };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::BadNamespace;
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_fatality_classification() {
        assert!(ProtocolError::MalformedLength(0).is_connection_fatal());
        assert!(!ProtocolError::BadNamespace.is_connection_fatal());
        assert!(!ProtocolError::TruncatedPayload {
            offset: 0,
            needed: 4,
            remaining: 0
        }
        .is_connection_fatal());
    }
}
