//! Download file names for cooked records.

use pantry_cook::RecordMetadata;
use regex::Regex;
use std::sync::LazyLock;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

const MAX_FILE_NAME_LENGTH: usize = 255;
/// Kept free below the limit when the channel name has to be cut.
const LENGTH_MARGIN: usize = 10;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Channel names written by the first recorder generation: `name#1234`.
regex!(LEGACY_CHANNEL, r"^(.*)#\d+$");
regex!(ILLEGAL, r#"[/?<>\\:*|"]"#);
regex!(CONTROL, r"[\x00-\x1f\x80-\x9f]");
// Rejected at the end of a name on Windows.
regex!(TRAILING, r"[. ]+$");

/// Name offered for the download of record `id` cooked to `extension`.
///
/// `<startTime>-<channel>-<id><extension>` when the record metadata knows
/// both the start time and the channel, `<id><extension>` otherwise. The
/// result never reaches 255 bytes and is safe to use as a file name on
/// every common platform.
///
/// # Examples
///
/// ```
/// use pantry_cook::RecordMetadata;
/// use pantry_records::format_file_name;
///
/// let metadata = RecordMetadata {
///     channel: Some("general#1234".to_string()),
///     start_time: Some("1700000000000".to_string()),
///     ..RecordMetadata::default()
/// };
/// assert_eq!(format_file_name(7, ".zip", Some(&metadata)), "1700000000000-general-7.zip");
/// assert_eq!(format_file_name(7, ".zip", None), "7.zip");
/// ```
#[must_use]
pub fn format_file_name(id: u64, extension: &str, metadata: Option<&RecordMetadata>) -> String {
    let name = metadata
        .and_then(|metadata| descriptive_name(id, extension, metadata))
        .unwrap_or_else(|| format!("{id}{extension}"));
    sanitize(&name)
}

fn descriptive_name(id: u64, extension: &str, metadata: &RecordMetadata) -> Option<String> {
    let channel = metadata.channel.as_deref()?;
    let started = epoch_millis(metadata.start_time.as_deref()?)?;
    let channel = match LEGACY_CHANNEL.captures(channel).and_then(|c| c.get(1)) {
        Some(name) => name.as_str(),
        None => channel,
    };
    let id = id.to_string();
    let name = format!("{started}-{channel}-{id}{extension}");
    if name.len() < MAX_FILE_NAME_LENGTH {
        return Some(name);
    }
    let budget = MAX_FILE_NAME_LENGTH.saturating_sub(started.len() + id.len() + extension.len() + LENGTH_MARGIN);
    let channel = truncate_to(channel, budget);
    Some(format!("{started}-{channel}-{id}{extension}"))
}

/// Start time as epoch milliseconds. Legacy info files carry a date string
/// instead; `None` if it is in no form we know.
fn epoch_millis(start_time: &str) -> Option<String> {
    let start_time = start_time.trim();
    if start_time.parse::<i64>().is_ok() {
        return Some(start_time.to_string());
    }
    let parsed = parse_legacy_date(start_time)?;
    Some((parsed.unix_timestamp_nanos() / 1_000_000).to_string())
}

fn parse_legacy_date(date: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(date, &Rfc3339) {
        return Some(parsed);
    }
    // Tue, 14 Nov 2023 22:13:20 GMT
    let utc = format_description!("[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT");
    if let Ok(parsed) = PrimitiveDateTime::parse(date, utc) {
        return Some(parsed.assume_utc());
    }
    // Tue Nov 14 2023 22:13:20 GMT+0000 (Coordinated Universal Time)
    let local = format_description!(
        "[weekday repr:short] [month repr:short] [day] [year] [hour]:[minute]:[second] GMT[offset_hour sign:mandatory][offset_minute]"
    );
    let without_zone_name = date.split(" (").next().unwrap_or(date);
    if let Ok(parsed) = OffsetDateTime::parse(without_zone_name, local) {
        return Some(parsed);
    }
    OffsetDateTime::parse(date, &Rfc2822).ok()
}

/// Longest prefix of `s` no longer than `max` bytes that ends on a character
/// boundary.
fn truncate_to(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let end = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    &s[..end]
}

fn sanitize(name: &str) -> String {
    let name = ILLEGAL.replace_all(name, "");
    let name = CONTROL.replace_all(&name, "");
    TRAILING.replace(&name, "").into_owned()
}
