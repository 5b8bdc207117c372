//! Data models for river-server
//!
//! - Track: one indexed audio file
//! - OutputFormat: the fixed table of streamable target formats

pub mod format;
pub mod track;

pub use format::{OutputFormat, UnknownFormat};
pub use track::{Track, TrackTags};
