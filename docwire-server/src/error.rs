//! Server error types.

use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] docwire_protocol::ProtocolError),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("reply write failed: {0}")]
    ReplyWrite(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use docwire_protocol::ProtocolError;

    #[test]
    fn test_error_conversion_and_display() {
        let err: ServerError = ProtocolError::MalformedLength(-1).into();
        assert!(err.to_string().contains("protocol error"));

        let err: ServerError =
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "closed").into();
        assert!(err.to_string().contains("closed"));
    }
}
