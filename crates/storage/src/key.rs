//! Object key validation.
//!
//! Keys are `/`-separated strings. Backends that map keys onto a filesystem
//! must never let a key escape their root, so every key goes through
//! [`validate`] before use.

use crate::error::{ErrorKind, Result};

/// Validates and normalizes an object key.
///
/// Empty and `.` segments are dropped, `..` segments pop the previous
/// segment, and any key that would climb above the root is rejected.
///
/// > **Note:** Null bytes and backslashes are rejected outright; the latter
/// >           are a path separator on Windows and would let a key smuggle in
/// >           directories the store never sees.
///
/// # Examples
///
/// ```
/// use pantry_storage::validate_key;
/// assert_eq!(validate_key("1234.ogg.data").unwrap(), "1234.ogg.data");
/// assert_eq!(validate_key("records//./1234.zip").unwrap(), "records/1234.zip");
/// assert!(validate_key("../1234.ogg.data").is_err());
/// assert!(validate_key("a\\b").is_err());
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<String> {
    let key = key.as_ref();
    if key.contains(['\0', '\\']) {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
            },
            s => segments.push(s),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
        false => Ok(segments.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert_eq!(validate("1234.ogg.data").unwrap(), "1234.ogg.data");
        assert_eq!(validate("a/b/c.zip").unwrap(), "a/b/c.zip");
        assert_eq!(validate("/leading/slash").unwrap(), "leading/slash");
    }

    #[test]
    fn test_normalization() {
        assert_eq!(validate("a//b//c").unwrap(), "a/b/c");
        assert_eq!(validate("a/./b/./c").unwrap(), "a/b/c");
        assert_eq!(validate("a/b/..").unwrap(), "a");
        assert_eq!(validate("records/").unwrap(), "records");
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("..").is_err());
    }

    #[test]
    fn test_invalid_characters() {
        assert!(validate("a\0b").is_err());
        assert!(validate("a\\b").is_err());
    }

    #[test]
    fn test_empty_keys() {
        assert!(validate("").is_err());
        assert!(validate(".").is_err());
        assert!(validate("//").is_err());
        assert!(validate("./.").is_err());
    }
}
