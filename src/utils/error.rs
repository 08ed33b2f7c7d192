use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Invalid bitstream framing: {0}")]
    InvalidBitstreamFraming(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a malformed container error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedContainer(msg.into())
    }

    /// Create an unsupported codec error
    pub fn unsupported_codec(msg: impl Into<String>) -> Self {
        Error::UnsupportedCodec(msg.into())
    }

    /// Create a missing configuration error
    pub fn missing_config(msg: impl Into<String>) -> Self {
        Error::MissingConfiguration(msg.into())
    }

    /// Create an invalid bitstream framing error
    pub fn framing(msg: impl Into<String>) -> Self {
        Error::InvalidBitstreamFraming(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Every error ends the session; the transmuxer must be rebuilt.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
