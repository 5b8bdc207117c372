//! Track entity and listing order

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Normalized metadata tags of a track
///
/// Numeric fields use `0` for "absent"; any value below 1 means the tag was
/// missing or unparsable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTags {
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub disc: u32,
    #[serde(default)]
    pub track: u32,
    #[serde(default)]
    pub title: String,
}

/// One audio file known to the library
///
/// Tracks are immutable once built; a reload replaces them wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Stable identifier, unique among indexed tracks
    pub id: String,
    /// Library-relative path, `/`-separated
    pub path: String,
    /// Source file modification time captured when the file was probed
    pub modified_at: DateTime<Utc>,
    pub tags: TrackTags,
    /// Container format name reported by the probe tool (e.g. `ogg`, `mp3`)
    pub container_format: String,
    /// Codec of the first audio stream (e.g. `opus`, `flac`)
    pub stream_codec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl Track {
    /// Listing order: artist, album, disc, track, title, then path
    ///
    /// Text keys compare case-insensitively; the raw path breaks remaining ties
    /// so the order is total and deterministic.
    pub fn listing_order(&self, other: &Self) -> Ordering {
        compare_folded(&self.tags.artist, &other.tags.artist)
            .then_with(|| compare_folded(&self.tags.album, &other.tags.album))
            .then_with(|| self.tags.disc.cmp(&other.tags.disc))
            .then_with(|| self.tags.track.cmp(&other.tags.track))
            .then_with(|| compare_folded(&self.tags.title, &other.tags.title))
            .then_with(|| self.path.cmp(&other.path))
    }
}

fn compare_folded(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
