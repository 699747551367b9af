//! Everything needed to turn a raw record into a downloadable file.
//!
//! - [`CookingOptions`] and the closed [`Format`]/[`Container`] enumerations,
//!   with the compatibility check every request goes through
//!   ([`CookingOptions::validate`]).
//! - [`file_metadata_for`], resolving the extension and MIME type of the
//!   cooked output.
//! - The on-disk record layout ([`SUFFIXES`]) and the optional
//!   [`RecordMetadata`] sidecar.
//! - The [`Encoder`], an external process producing the cooked bytes on its
//!   standard output.

mod encoder;
pub mod error;
mod metadata;
mod options;
mod record;

pub use crate::encoder::{CookedStream, Encoder};
pub use crate::metadata::{FileMetadata, file_metadata_for};
pub use crate::options::{Container, CookingOptions, Format};
pub use crate::record::{RecordMetadata, SUFFIXES, record_files, remote_prefix};
