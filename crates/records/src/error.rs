//! Records Error Types
//!
//! Child errors from the cook, storage and notification crates are raised
//! into one of these kinds with `or_raise`, so the original failure stays in
//! the error tree.

use derive_more::{Display, Error};
use pantry_cook::error::{Error as CookError, ErrorKind as CookErrorKind};

/// A records error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for records operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The format/container combination can never be produced. Always the
    /// caller's to fix; carries the reason to show them.
    #[display("{_0}")]
    OptionsInvalid(#[error(not(source))] String),
    /// An operation needing the remote tier ran without one configured.
    #[display("no remote object store configured")]
    RemoteStoreMissing,
    /// The remote tier holds nothing for this record.
    #[display("record {_0} not found on the remote object store")]
    RemoteRecordMissing(#[error(not(source))] u64),
    /// Some downloaded objects could not be written locally. Files written
    /// before the failure are left in place.
    #[display("could not materialize record {id}: {}", failures.join("; "))]
    Download { id: u64, failures: Vec<String> },
    /// The remote object store failed.
    #[display("object store operation failed")]
    Storage,
    /// Local record files could not be inspected or removed.
    #[display("local record operation failed")]
    Local,
    /// The sidecar info file is missing or malformed.
    #[display("could not read record metadata")]
    Metadata,
    /// A job could not write its output file.
    #[display("could not write cooked output")]
    Write,
    /// A job could not upload its output file.
    #[display("could not upload cooked output")]
    Upload,
    /// The encoder could not be started.
    #[display("could not start the encoder")]
    Encoder,
    /// Some records of a batch exist on no tier.
    #[display("records not found: {}", display_ids(_0))]
    NotFound(#[error(not(source))] Vec<u64>),
}

fn display_ids(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",")
}

impl ErrorKind {
    /// Raise a rejected set of cooking options, keeping the reason for the
    /// caller and the cook crate's error as a child.
    #[track_caller]
    pub fn options_invalid(err: CookError) -> Error {
        let reason = match &*err {
            CookErrorKind::OptionsInvalid(reason) => reason.clone(),
            other => other.to_string(),
        };
        err.raise(ErrorKind::OptionsInvalid(reason))
    }

    /// Storage-layer failures, as opposed to caller mistakes.
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            Self::RemoteStoreMissing
                | Self::RemoteRecordMissing(_)
                | Self::Download { .. }
                | Self::Storage
                | Self::Local
                | Self::Metadata
                | Self::Write
                | Self::Upload
        )
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Download { .. } | Self::Storage | Self::Write | Self::Upload | Self::Encoder)
    }
}
