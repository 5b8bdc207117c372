//! Metadata probe tool wrapper
//!
//! Runs the probe tool (`ffprobe`/`avprobe`) once per file with combined
//! format- and stream-level JSON output, then extracts:
//! - whether the file carries an audio stream
//! - normalized tags (artist, album, disc, track, title)
//! - container and codec identity

use crate::models::TrackTags;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Minimum probe score accepted as a confident container identification.
///
/// The probe tool scores 100 for a positive identification and drops to 25 or
/// below when it is only guessing (truncated files, unrelated data).
pub const MIN_PROBE_SCORE: i64 = 25;

/// Probe errors
#[derive(Debug, Error)]
pub enum ProbeError {
    /// File is not usable audio (no audio stream, or low confidence)
    #[error("Not audio: {0}")]
    NotAudio(String),

    /// Tool could not be run or produced unusable output
    #[error("Probe failed: {0}")]
    Failed(String),
}

/// Result of a successful probe
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedMetadata {
    pub tags: TrackTags,
    pub container_format: String,
    pub stream_codec: String,
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeSection>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeSection {
    codec_type: Option<String>,
    codec_name: Option<String>,
    #[serde(default)]
    tags: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    probe_score: Option<i64>,
    duration: Option<Value>,
    #[serde(default)]
    tags: HashMap<String, Value>,
}

/// Metadata prober bound to a resolved probe executable
#[derive(Debug, Clone)]
pub struct MetadataProber {
    tool: PathBuf,
}

impl MetadataProber {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self { tool: tool.into() }
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    /// Probe one file
    pub async fn probe(&self, path: &Path) -> Result<ProbedMetadata, ProbeError> {
        let output = Command::new(&self.tool)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ProbeError::Failed(format!("{}: {}", self.tool.display(), e)))?;

        if !output.status.success() {
            return Err(ProbeError::Failed(format!(
                "{} exited with {}",
                self.tool.display(),
                output.status
            )));
        }

        parse_probe_output(&output.stdout)
    }
}

/// Parse the probe tool's JSON output
pub fn parse_probe_output(stdout: &[u8]) -> Result<ProbedMetadata, ProbeError> {
    let output: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| ProbeError::Failed(format!("Invalid probe output: {}", e)))?;

    let format = output
        .format
        .ok_or_else(|| ProbeError::Failed("Probe output has no format section".to_string()))?;

    let audio = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| ProbeError::NotAudio("no audio stream".to_string()))?;

    if let Some(score) = format.probe_score {
        if score < MIN_PROBE_SCORE {
            return Err(ProbeError::NotAudio(format!(
                "probe score {} below {}",
                score, MIN_PROBE_SCORE
            )));
        }
    }

    // Format-level tags win over stream tags; streams are consulted in order
    let sources: Vec<&HashMap<String, Value>> = std::iter::once(&format.tags)
        .chain(output.streams.iter().map(|s| &s.tags))
        .collect();

    let tags = TrackTags {
        artist: lookup_tag(&sources, &["artist"]).unwrap_or_default(),
        album: lookup_tag(&sources, &["album"]).unwrap_or_default(),
        disc: lookup_tag(&sources, &["disc", "discnumber"])
            .map(|v| parse_position(&v))
            .unwrap_or(0),
        track: lookup_tag(&sources, &["track", "tracknumber"])
            .map(|v| parse_position(&v))
            .unwrap_or(0),
        title: lookup_tag(&sources, &["title"]).unwrap_or_default(),
    };

    Ok(ProbedMetadata {
        tags,
        container_format: format.format_name.unwrap_or_default(),
        stream_codec: audio.codec_name.clone().unwrap_or_default(),
        duration_secs: format.duration.as_ref().and_then(value_as_f64),
    })
}

/// First match for any alias across tag sources
///
/// Within one source, tries the lower-case key, the upper-case key, then any
/// case-insensitive match.
fn lookup_tag(sources: &[&HashMap<String, Value>], aliases: &[&str]) -> Option<String> {
    sources.iter().find_map(|tags| {
        aliases.iter().find_map(|alias| {
            tags.get(*alias)
                .or_else(|| tags.get(&alias.to_uppercase()))
                .or_else(|| {
                    tags.iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(alias))
                        .map(|(_, v)| v)
                })
                .and_then(value_as_string)
        })
    })
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a disc/track position, accepting the `N/total` form
///
/// Returns 0 ("absent") when the numerator is not a number.
pub fn parse_position(value: &str) -> u32 {
    value
        .split('/')
        .next()
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<ProbedMetadata, ProbeError> {
        parse_probe_output(value.to_string().as_bytes())
    }

    #[test]
    fn test_parse_full_output() {
        let meta = parse(json!({
            "streams": [
                {"codec_type": "audio", "codec_name": "flac", "tags": {"TITLE": "Stream Title"}}
            ],
            "format": {
                "format_name": "flac",
                "probe_score": 100,
                "duration": "201.5",
                "tags": {"ARTIST": "Artist", "album": "Album", "track": "3/12", "DISC": "2"}
            }
        }))
        .unwrap();

        assert_eq!(meta.tags.artist, "Artist");
        assert_eq!(meta.tags.album, "Album");
        assert_eq!(meta.tags.track, 3);
        assert_eq!(meta.tags.disc, 2);
        assert_eq!(meta.tags.title, "Stream Title");
        assert_eq!(meta.container_format, "flac");
        assert_eq!(meta.stream_codec, "flac");
        assert_eq!(meta.duration_secs, Some(201.5));
    }

    #[test]
    fn test_format_tags_preferred_over_stream_tags() {
        let meta = parse(json!({
            "streams": [{"codec_type": "audio", "codec_name": "vorbis", "tags": {"ARTIST": "stream"}}],
            "format": {"format_name": "ogg", "tags": {"artist": "format"}}
        }))
        .unwrap();
        assert_eq!(meta.tags.artist, "format");
    }

    #[test]
    fn test_mixed_case_key_found() {
        let meta = parse(json!({
            "streams": [{"codec_type": "audio", "codec_name": "mp3"}],
            "format": {"format_name": "mp3", "tags": {"Artist": "Mixed", "TrackNumber": "7"}}
        }))
        .unwrap();
        assert_eq!(meta.tags.artist, "Mixed");
        assert_eq!(meta.tags.track, 7);
    }

    #[test]
    fn test_codec_from_first_audio_stream() {
        let meta = parse(json!({
            "streams": [
                {"codec_type": "video", "codec_name": "mjpeg"},
                {"codec_type": "audio", "codec_name": "mp3"}
            ],
            "format": {"format_name": "mp3"}
        }))
        .unwrap();
        assert_eq!(meta.stream_codec, "mp3");
        assert_eq!(meta.tags, TrackTags::default());
    }

    #[test]
    fn test_no_audio_stream_is_not_audio() {
        let result = parse(json!({
            "streams": [{"codec_type": "video", "codec_name": "png"}],
            "format": {"format_name": "png_pipe", "probe_score": 100}
        }));
        assert!(matches!(result, Err(ProbeError::NotAudio(_))));
    }

    #[test]
    fn test_low_probe_score_is_not_audio() {
        let result = parse(json!({
            "streams": [{"codec_type": "audio", "codec_name": "mp3"}],
            "format": {"format_name": "mp3", "probe_score": 1}
        }));
        assert!(matches!(result, Err(ProbeError::NotAudio(_))));
    }

    #[test]
    fn test_malformed_output_is_failure() {
        let result = parse_probe_output(b"not json");
        assert!(matches!(result, Err(ProbeError::Failed(_))));
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("4"), 4);
        assert_eq!(parse_position("4/10"), 4);
        assert_eq!(parse_position(" 5 / 9"), 5);
        assert_eq!(parse_position("/10"), 0);
        assert_eq!(parse_position("A1"), 0);
        assert_eq!(parse_position(""), 0);
    }
}
