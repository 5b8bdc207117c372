//! Streamable output formats
//!
//! Each format has a fixed encoder codec, container, and argument list. A
//! source already in the format's container and codec is served as-is.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Requested format name is not in the table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown format: {0}")]
pub struct UnknownFormat(pub String);

/// Target format for streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Opus in Ogg: fixed bitrate, fastest compression effort
    Opus,
    /// MP3: fixed VBR quality index
    Mp3,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Opus, OutputFormat::Mp3];

    /// Name used in request paths
    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Opus => "opus",
            OutputFormat::Mp3 => "mp3",
        }
    }

    /// Encoder passed to `-c:a`
    pub fn encoder(self) -> &'static str {
        match self {
            OutputFormat::Opus => "libopus",
            OutputFormat::Mp3 => "libmp3lame",
        }
    }

    /// Muxer passed to `-f`
    pub fn container(self) -> &'static str {
        match self {
            OutputFormat::Opus => "ogg",
            OutputFormat::Mp3 => "mp3",
        }
    }

    /// Codec name the probe tool reports for this format's streams
    pub fn stream_codec(self) -> &'static str {
        match self {
            OutputFormat::Opus => "opus",
            OutputFormat::Mp3 => "mp3",
        }
    }

    /// Artifact file extension
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Opus => "opus",
            OutputFormat::Mp3 => "mp3",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            OutputFormat::Opus => "audio/ogg",
            OutputFormat::Mp3 => "audio/mpeg",
        }
    }

    /// Codec-specific quality arguments
    pub fn encoder_args(self) -> &'static [&'static str] {
        match self {
            OutputFormat::Opus => &["-b:a", "128000", "-compression_level", "0"],
            OutputFormat::Mp3 => &["-q:a", "4"],
        }
    }

    /// Whether a source with this container/codec can be served unchanged
    ///
    /// The probe tool may report a comma-separated list of container aliases
    /// (e.g. `mov,mp4,m4a`); any alias matching counts.
    pub fn accepts_source(self, container_format: &str, stream_codec: &str) -> bool {
        stream_codec == self.stream_codec()
            && container_format
                .split(',')
                .any(|alias| alias.trim() == self.container())
    }

    /// Format whose artifacts use `extension`
    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.extension() == extension)
    }
}

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
