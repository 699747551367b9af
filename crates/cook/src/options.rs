use crate::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Audio codec used inside the container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Raw per-user streams, untouched
    Copy,
    OggFlac,
    Vorbis,
    Aac,
    /// High-efficiency AAC
    HeAac,
    Flac,
    #[default]
    Opus,
    Wav,
    Adpcm,
    /// 8-bit WAV
    Wav8,
    Mp3,
    /// RealAudio
    Ra,
}

impl Format {
    pub const ALL: [Format; 12] = [
        Format::Copy,
        Format::OggFlac,
        Format::Vorbis,
        Format::Aac,
        Format::HeAac,
        Format::Flac,
        Format::Opus,
        Format::Wav,
        Format::Adpcm,
        Format::Wav8,
        Format::Mp3,
        Format::Ra,
    ];

    /// Name understood by the encoder and used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Copy => "copy",
            Format::OggFlac => "oggflac",
            Format::Vorbis => "vorbis",
            Format::Aac => "aac",
            Format::HeAac => "heaac",
            Format::Flac => "flac",
            Format::Opus => "opus",
            Format::Wav => "wav",
            Format::Adpcm => "adpcm",
            Format::Wav8 => "wav8",
            Format::Mp3 => "mp3",
            Format::Ra => "ra",
        }
    }
}

/// Outer file wrapper of the cooked output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// A single stream mixing every track
    #[default]
    Mix,
    /// Audacity project, zipped
    AupZip,
    Zip,
    Matroska,
    Ogg,
}

impl Container {
    pub const ALL: [Container; 5] =
        [Container::Mix, Container::AupZip, Container::Zip, Container::Matroska, Container::Ogg];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Container::Mix => "mix",
            Container::AupZip => "aupzip",
            Container::Zip => "zip",
            Container::Matroska => "matroska",
            Container::Ogg => "ogg",
        }
    }

    /// Archive containers bundle every per-user stream unmodified.
    #[must_use]
    pub fn is_archive(&self) -> bool {
        matches!(self, Container::Zip | Container::AupZip)
    }
}

macro_rules! string_enum {
    ($name:ident, $kind:ident) => {
        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                write!(f, "{}", self.as_str())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &'static str {
                self.as_str()
            }
        }

        impl FromStr for $name {
            type Err = Error;
            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let lowered = s.trim().to_lowercase();
                match Self::ALL.into_iter().find(|v| v.as_str() == lowered) {
                    Some(value) => Ok(value),
                    None => exn::bail!(ErrorKind::$kind(s.to_string())),
                }
            }
        }
    };
}
string_enum!(Format, UnknownFormat);
string_enum!(Container, UnknownContainer);

const BANNED_FOR_OGG: [Format; 4] = [Format::Mp3, Format::Aac, Format::HeAac, Format::Ra];
const BANNED_FOR_MATROSKA: [Format; 2] = [Format::Aac, Format::HeAac];

/// What to cook a record into. Built per request, never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookingOptions {
    pub format: Format,
    pub container: Container,
    /// Dynamic audio normalization.
    #[serde(default)]
    pub dynaudnorm: bool,
}

impl CookingOptions {
    pub fn new(format: Format, container: Container) -> Self {
        Self {
            format,
            container,
            dynaudnorm: false,
        }
    }

    /// Check the combination can actually be produced.
    ///
    /// Rules are checked in order and the first one that matches decides the
    /// rejection reason. Pure and total over every format/container pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use pantry_cook::{Container, CookingOptions, Format};
    ///
    /// assert!(CookingOptions::new(Format::Copy, Container::Zip).validate().is_ok());
    /// assert!(CookingOptions::new(Format::Copy, Container::Mix).validate().is_err());
    /// assert!(CookingOptions::new(Format::Mp3, Container::Ogg).validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.format == Format::Copy && !self.container.is_archive() {
            exn::bail!(ErrorKind::OptionsInvalid(format!(
                "format {} can only produce archives, select the {} or {} container",
                Format::Copy,
                Container::Zip,
                Container::AupZip,
            )));
        }
        if self.container == Container::Ogg && BANNED_FOR_OGG.contains(&self.format) {
            let alternative = if BANNED_FOR_MATROSKA.contains(&self.format) {
                Container::Mix
            } else {
                Container::Matroska
            };
            exn::bail!(ErrorKind::OptionsInvalid(format!(
                "container {} cannot carry {} audio streams, select another format or the {} container",
                Container::Ogg,
                self.format,
                alternative,
            )));
        }
        if self.container == Container::Matroska && BANNED_FOR_MATROSKA.contains(&self.format) {
            exn::bail!(ErrorKind::OptionsInvalid(format!(
                "container {} cannot carry {} audio streams, select another format or the {} container",
                Container::Matroska,
                self.format,
                Container::Mix,
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Format::Copy, Container::Zip, true)]
    #[case(Format::Copy, Container::AupZip, true)]
    #[case(Format::Copy, Container::Mix, false)]
    #[case(Format::Copy, Container::Ogg, false)]
    #[case(Format::Copy, Container::Matroska, false)]
    #[case(Format::Mp3, Container::Ogg, false)]
    #[case(Format::Aac, Container::Ogg, false)]
    #[case(Format::HeAac, Container::Ogg, false)]
    #[case(Format::Ra, Container::Ogg, false)]
    #[case(Format::Vorbis, Container::Ogg, true)]
    #[case(Format::Flac, Container::Ogg, true)]
    #[case(Format::Aac, Container::Matroska, false)]
    #[case(Format::HeAac, Container::Matroska, false)]
    #[case(Format::Mp3, Container::Matroska, true)]
    #[case(Format::Aac, Container::Mix, true)]
    #[case(Format::Opus, Container::Mix, true)]
    fn test_validate(#[case] format: Format, #[case] container: Container, #[case] accepted: bool) {
        assert_eq!(CookingOptions::new(format, container).validate().is_ok(), accepted);
    }

    #[test]
    fn test_validate_is_total_and_deterministic() {
        for format in Format::ALL {
            for container in Container::ALL {
                let options = CookingOptions::new(format, container);
                let reasons: Vec<Option<String>> = (0..2)
                    .map(|_| options.validate().err().map(|e| (*e).to_string()))
                    .collect();
                assert_eq!(reasons[0], reasons[1], "{format}/{container}");
            }
        }
    }

    #[test]
    fn test_copy_rule_wins_over_ogg_rule() {
        let err = CookingOptions::new(Format::Copy, Container::Ogg).validate().unwrap_err();
        let ErrorKind::OptionsInvalid(reason) = &*err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(reason.starts_with("format copy"));
    }

    #[rstest]
    #[case(Format::Mp3, "matroska")]
    #[case(Format::Ra, "matroska")]
    #[case(Format::Aac, "mix")]
    #[case(Format::HeAac, "mix")]
    fn test_ogg_rejection_suggests_a_valid_container(#[case] format: Format, #[case] suggested: &str) {
        let err = CookingOptions::new(format, Container::Ogg).validate().unwrap_err();
        let ErrorKind::OptionsInvalid(reason) = &*err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(reason.ends_with(&format!("the {suggested} container")), "{reason}");
        let container = suggested.parse::<Container>().unwrap();
        assert!(CookingOptions::new(format, container).validate().is_ok());
    }

    #[rstest]
    #[case("opus", Format::Opus)]
    #[case("HEAAC", Format::HeAac)]
    #[case(" oggflac ", Format::OggFlac)]
    #[case("wav8", Format::Wav8)]
    fn test_format_from_str(#[case] input: &str, #[case] expected: Format) {
        assert_eq!(input.parse::<Format>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_names() {
        assert!("ogg-vorbis".parse::<Format>().is_err());
        let err = "tar".parse::<Container>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownContainer(_)));
    }

    #[test]
    fn test_names_round_trip_through_serde() {
        for format in Format::ALL {
            let json = serde_json::to_string(&format).unwrap();
            assert_eq!(json, format!("\"{}\"", format.as_str()));
        }
        for container in Container::ALL {
            assert_eq!(container.to_string().parse::<Container>().unwrap(), container);
        }
    }

    #[test]
    fn test_defaults() {
        let options = CookingOptions::default();
        assert_eq!(options.format, Format::Opus);
        assert_eq!(options.container, Container::Mix);
        assert!(!options.dynaudnorm);
    }
}
