//! Cooking Error Types

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A cooking error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cooking operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The format/container combination can never be produced. Carries a
    /// reason meant for the person who made the request.
    #[display("invalid cooking options: {_0}")]
    OptionsInvalid(#[error(not(source))] String),
    #[display("unknown format: {_0}")]
    UnknownFormat(#[error(not(source))] String),
    #[display("unknown container: {_0}")]
    UnknownContainer(#[error(not(source))] String),
    /// The encoder executable could not be located.
    #[display("encoder not found: {_0}")]
    EncoderNotFound(#[error(not(source))] String),
    #[display("failed to start encoder: {_0}")]
    Spawn(IoError),
    /// Sidecar info file is not the JSON object it should be.
    #[display("malformed record metadata")]
    RecordMetadata(serde_json::Error),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Spawn(_))
    }
}
