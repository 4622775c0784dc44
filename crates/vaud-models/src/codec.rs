//! Audio codec selection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output audio codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// LAME MP3 with VBR quality
    #[default]
    Mp3,
    /// AAC at 128k
    Aac,
    /// Copy the source audio stream as-is
    Copy,
}

impl AudioCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Aac => "aac",
            AudioCodec::Copy => "copy",
        }
    }

    /// File extension of the produced artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Aac | AudioCodec::Copy => "m4a",
        }
    }

    /// Content type served for the produced artifact.
    pub fn content_type(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "audio/mpeg",
            AudioCodec::Aac | AudioCodec::Copy => "audio/mp4",
        }
    }

    /// Content type of an artifact judged by its file extension, for files
    /// produced under a codec setting that may differ from the current one.
    pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
        [AudioCodec::Mp3, AudioCodec::Aac]
            .into_iter()
            .find(|c| c.extension().eq_ignore_ascii_case(extension))
            .map(|c| c.content_type())
    }
}

impl std::fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AudioCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioCodec::Mp3),
            "aac" => Ok(AudioCodec::Aac),
            "copy" => Ok(AudioCodec::Copy),
            other => Err(format!("unsupported codec: {}", other)),
        }
    }
}

/// Conversion parameters handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConversionSettings {
    pub codec: AudioCodec,
    /// LAME VBR quality, 0 (best) to 9 (worst). Only used for mp3.
    pub quality: u8,
}

impl ConversionSettings {
    pub const DEFAULT_QUALITY: u8 = 2;
    pub const MAX_QUALITY: u8 = 9;

    pub fn new(codec: AudioCodec, quality: u8) -> Self {
        Self {
            codec,
            quality: quality.min(Self::MAX_QUALITY),
        }
    }
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self::new(AudioCodec::Mp3, Self::DEFAULT_QUALITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert_eq!(AudioCodec::Mp3.extension(), "mp3");
        assert_eq!(AudioCodec::Aac.extension(), "m4a");
        assert_eq!(AudioCodec::Copy.extension(), "m4a");
    }

    #[test]
    fn test_content_type_for_extension() {
        assert_eq!(AudioCodec::content_type_for_extension("mp3"), Some("audio/mpeg"));
        assert_eq!(AudioCodec::content_type_for_extension("M4A"), Some("audio/mp4"));
        assert_eq!(AudioCodec::content_type_for_extension("wav"), None);
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(ConversionSettings::new(AudioCodec::Mp3, 42).quality, 9);
        assert_eq!(ConversionSettings::default().quality, 2);
    }

    #[test]
    fn test_parse_codec() {
        assert_eq!("AAC".parse::<AudioCodec>().unwrap(), AudioCodec::Aac);
        assert!("flac".parse::<AudioCodec>().is_err());
    }
}
