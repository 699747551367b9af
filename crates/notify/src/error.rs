//! Notification Error Types

use derive_more::{Display, Error};

/// A notification error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for notification operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The payload could not be encoded for the transport.
    #[display("could not encode payload for topic {topic}")]
    Encode { topic: String, source: serde_json::Error },
    /// The transport refused or failed to deliver the message.
    #[display("delivery failed: {_0}")]
    Transport(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
