//! Shared fixtures for river-server integration tests
//!
//! The probe and encoder are replaced by shell scripts:
//! - Library files hold the probe tool's JSON output; the fake probe prints
//!   the file it is given
//! - The fake encoder logs each invocation, then copies the source to the
//!   output path after a short delay

#![allow(dead_code)]

use river_server::services::{Library, LibrarySettings};
use serde_json::json;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const FAKE_PROBE: &str = r#"#!/bin/sh
for arg in "$@"; do last="$arg"; done
exec cat "$last"
"#;

const FAKE_ENCODER: &str = r#"#!/bin/sh
echo "$@" >> "__LOG__"
prev=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then src="$arg"; fi
  prev="$arg"
  last="$arg"
done
sleep 0.5
cp "$src" "$last"
"#;

const FAILING_ENCODER: &str = r#"#!/bin/sh
echo "$@" >> "__LOG__"
for arg in "$@"; do last="$arg"; done
sleep 0.5
printf 'partial' > "$last"
echo "unsupported input" >&2
exit 1
"#;

/// Temporary library, data directory and fake tools
pub struct TestEnv {
    pub dir: TempDir,
    pub library: PathBuf,
    pub data: PathBuf,
    pub probe: PathBuf,
    pub encoder: PathBuf,
    pub encoder_log: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_encoder(FAKE_ENCODER)
    }

    pub fn with_failing_encoder() -> Self {
        Self::with_encoder(FAILING_ENCODER)
    }

    fn with_encoder(script: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let library = dir.path().join("library");
        let data = dir.path().join("data");
        let tools = dir.path().join("tools");
        for d in [&library, &data, &tools] {
            std::fs::create_dir_all(d).unwrap();
        }

        let encoder_log = dir.path().join("encoder.log");
        let probe = write_script(&tools.join("fake-probe"), FAKE_PROBE);
        let encoder = write_script(
            &tools.join("fake-encoder"),
            &script.replace("__LOG__", encoder_log.to_str().unwrap()),
        );

        Self {
            dir,
            library,
            data,
            probe,
            encoder,
            encoder_log,
        }
    }

    pub fn settings(&self) -> LibrarySettings {
        LibrarySettings {
            library_root: self.library.clone(),
            data_dir: self.data.clone(),
            probe_tool: self.probe.clone(),
            transcode_tool: self.encoder.clone(),
            probe_concurrency: 4,
        }
    }

    pub async fn open(&self) -> Library {
        Library::open(self.settings()).await.unwrap()
    }

    /// Write a library file holding `probe_json`
    pub fn write_track(&self, relative: &str, probe_json: &str) -> PathBuf {
        let path = self.library.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, probe_json).unwrap();
        path
    }

    /// Rewrite a library file and push its mtime forward
    pub fn rewrite_track(&self, relative: &str, probe_json: &str) {
        let path = self.write_track(relative, probe_json);
        set_modified(&path, SystemTime::now() + Duration::from_secs(60));
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.data.join(".stream")
    }

    pub fn artifact(&self, id: &str, extension: &str) -> PathBuf {
        self.artifact_dir().join(format!("{}.{}", id, extension))
    }

    /// Number of times the fake encoder ran
    pub fn encoder_invocations(&self) -> usize {
        std::fs::read_to_string(&self.encoder_log)
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }
}

fn write_script(path: &Path, body: &str) -> PathBuf {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_path_buf()
}

pub fn set_modified(path: &Path, time: SystemTime) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

/// Probe output for a FLAC file with the given tags
pub fn flac(artist: &str, album: &str, track: u32, title: &str) -> String {
    audio("flac", "flac", artist, album, track, title)
}

/// Probe output for an audio file in any container/codec
pub fn audio(
    container: &str,
    codec: &str,
    artist: &str,
    album: &str,
    track: u32,
    title: &str,
) -> String {
    json!({
        "streams": [{"codec_type": "audio", "codec_name": codec}],
        "format": {
            "format_name": container,
            "probe_score": 100,
            "duration": "180.000000",
            "tags": {
                "ARTIST": artist,
                "ALBUM": album,
                "track": format!("{}/12", track),
                "TITLE": title,
            }
        }
    })
    .to_string()
}

/// Probe output for a file with no audio stream
pub fn no_audio() -> String {
    json!({
        "streams": [{"codec_type": "video", "codec_name": "mjpeg"}],
        "format": {"format_name": "image2", "probe_score": 50}
    })
    .to_string()
}

/// Probe output for a file the probe tool only guessed at
pub fn low_score() -> String {
    json!({
        "streams": [{"codec_type": "audio", "codec_name": "mp3"}],
        "format": {"format_name": "mp3", "probe_score": 24}
    })
    .to_string()
}
