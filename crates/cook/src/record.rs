use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Segment files a record is made of. A record is present in a directory
/// only when every one of them is.
pub const SUFFIXES: [&str; 5] = [".ogg.data", ".ogg.header1", ".ogg.header2", ".ogg.info", ".ogg.users"];

/// Suffix of the sidecar written by the recorder when a record starts.
const INFO_SUFFIX: &str = ".ogg.info";

/// Paths of every segment file of record `id` below `dir`.
#[must_use]
pub fn record_files(dir: &Path, id: u64) -> [PathBuf; 5] {
    SUFFIXES.map(|suffix| dir.join(format!("{id}{suffix}")))
}

/// Key prefix shared by every segment object of record `id`, and by nothing
/// else: `12.ogg.` doesn't match record 1, nor the cooked `12.zip`.
#[must_use]
pub fn remote_prefix(id: u64) -> String {
    format!("{id}.ogg.")
}

/// Best-effort information about a record, read from its sidecar info file.
///
/// Every field is optional; older recorders wrote some of them as numbers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    /// Name of the user who requested the recording.
    #[serde(default, deserialize_with = "lenient_string")]
    pub requester: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub requester_id: Option<String>,
    /// Epoch milliseconds, or a human-readable date in legacy files.
    #[serde(default, deserialize_with = "lenient_string")]
    pub start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub guild: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub channel: Option<String>,
}

impl RecordMetadata {
    /// Path of the sidecar info file of record `id` below `dir`.
    #[must_use]
    pub fn path(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("{id}{INFO_SUFFIX}"))
    }

    /// Parse the content of a sidecar info file.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data).map_err(ErrorKind::RecordMetadata)?)
    }
}

/// Accept strings, numbers and booleans; treat `null` as absent.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    use serde_json::Value;
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => return Err(serde::de::Error::custom(format!("expected a string, found {other}"))),
    })
}
