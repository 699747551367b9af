use crate::options::{Container, CookingOptions, Format};
use serde::Serialize;

/// Extension and MIME type of a cooked file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FileMetadata {
    /// Includes the leading dot; may span several dots (`.aup.zip`).
    pub extension: &'static str,
    pub mime: &'static str,
}

impl FileMetadata {
    const fn new(extension: &'static str, mime: &'static str) -> Self {
        Self { extension, mime }
    }

    /// Generic binary download.
    pub const FALLBACK: FileMetadata = FileMetadata::new("", "application/octet-stream");
}

/// Containers producing the same kind of file whatever the format.
fn container_metadata(container: Container) -> Option<FileMetadata> {
    match container {
        Container::AupZip => Some(FileMetadata::new(".aup.zip", "application/zip")),
        Container::Zip => Some(FileMetadata::new(".zip", "application/zip")),
        Container::Matroska => Some(FileMetadata::new(".mkv", "video/x-matroska")),
        Container::Ogg => Some(FileMetadata::new(".ogg", "audio/ogg")),
        Container::Mix => None,
    }
}

/// A mixed single stream is typed by its codec.
fn format_metadata(format: Format) -> Option<FileMetadata> {
    match format {
        Format::HeAac | Format::Aac => Some(FileMetadata::new(".aac", "audio/aac")),
        Format::Mp3 => Some(FileMetadata::new(".mp3", "audio/mp3")),
        Format::Wav | Format::Wav8 => Some(FileMetadata::new(".wav", "audio/x-wav")),
        Format::Adpcm => Some(FileMetadata::new(".raw", "audio/x-wav")),
        Format::Ra => Some(FileMetadata::new(".ra", "audio/vnd.rn-realaudio")),
        Format::Opus => Some(FileMetadata::new(".ogg", "audio/ogg")),
        Format::Vorbis => Some(FileMetadata::new(".ogg", "audio/vorbis")),
        Format::Flac => Some(FileMetadata::new(".flac", "audio/flac")),
        Format::OggFlac => Some(FileMetadata::new(".ogg", "audio/ogg")),
        Format::Copy => None,
    }
}

/// Resolve what a cook with `options` produces. Never fails: combinations
/// without a table entry degrade to [`FileMetadata::FALLBACK`].
///
/// # Examples
///
/// ```
/// use pantry_cook::{Container, CookingOptions, Format, file_metadata_for};
///
/// let zip = file_metadata_for(&CookingOptions::new(Format::Flac, Container::Zip));
/// assert_eq!((zip.extension, zip.mime), (".zip", "application/zip"));
/// ```
#[must_use]
pub fn file_metadata_for(options: &CookingOptions) -> FileMetadata {
    container_metadata(options.container)
        .or_else(|| format_metadata(options.format))
        .unwrap_or(FileMetadata::FALLBACK)
}
