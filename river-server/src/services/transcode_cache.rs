//! On-demand transcode cache
//!
//! Guarantees a complete encoded artifact exists before returning it:
//! - Source already in the requested format: served directly, nothing cached
//! - Artifact on disk: returned without running the encoder
//! - Miss: exactly one caller encodes; concurrent callers for the same
//!   artifact wait and then share the outcome
//!
//! Artifacts live at `<artifact dir>/<id>.<ext>`. Encodes write
//! `<id>.<ext>.part` and rename on success, so readers never see a partial
//! artifact.

use crate::models::{OutputFormat, Track};
use crate::services::keyed_locks::KeyedLocks;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Suffix of in-progress encode outputs
pub const PARTIAL_SUFFIX: &str = "part";

/// Transcode errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Encoder exited non-zero or could not be run
    #[error("Encoding {id} to {format} failed: {message}")]
    EncodeFailed {
        id: String,
        format: OutputFormat,
        message: String,
    },

    /// Artifact directory I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encode task panicked or was aborted
    #[error("Encode task failed: {0}")]
    Task(String),
}

/// Where a stream request is served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Obtained {
    /// Source file already in the requested format
    Passthrough(PathBuf),
    /// Artifact that existed before this request
    Cached(PathBuf),
    /// Artifact produced (by this or a concurrent request) while waiting
    Encoded(PathBuf),
}

impl Obtained {
    pub fn path(&self) -> &Path {
        match self {
            Obtained::Passthrough(p) | Obtained::Cached(p) | Obtained::Encoded(p) => p,
        }
    }
}

/// Per-artifact dedup state
///
/// `attempts` only changes while `last_failure` is locked, so a caller that
/// reads it before waiting can tell whether an attempt finished meanwhile.
#[derive(Debug, Default)]
pub struct EncodeSlot {
    attempts: AtomicU64,
    last_failure: Mutex<Option<String>>,
}

/// Transcode cache bound to an encoder executable and artifact directory
pub struct TranscodeCache {
    tool: PathBuf,
    library_root: PathBuf,
    artifact_dir: PathBuf,
    slots: KeyedLocks<PathBuf, EncodeSlot>,
}

impl TranscodeCache {
    pub fn new(
        tool: impl Into<PathBuf>,
        library_root: impl Into<PathBuf>,
        artifact_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tool: tool.into(),
            library_root: library_root.into(),
            artifact_dir: artifact_dir.into(),
            slots: KeyedLocks::new(),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Deterministic artifact location for (id, format)
    pub fn artifact_path(&self, id: &str, format: OutputFormat) -> PathBuf {
        self.artifact_dir
            .join(format!("{}.{}", id, format.extension()))
    }

    /// Number of artifacts with a request currently in flight
    pub fn in_flight(&self) -> usize {
        self.slots.active()
    }

    /// Return a path holding `track` in `format`, encoding if needed
    ///
    /// The encode runs on its own task: a caller that goes away does not
    /// cancel it, and waiters still observe its outcome.
    pub async fn obtain(
        &self,
        track: &Track,
        format: OutputFormat,
    ) -> Result<Obtained, TranscodeError> {
        if format.accepts_source(&track.container_format, &track.stream_codec) {
            return Ok(Obtained::Passthrough(self.library_root.join(&track.path)));
        }

        let artifact = self.artifact_path(&track.id, format);
        if is_file(&artifact).await {
            return Ok(Obtained::Cached(artifact));
        }

        let job = self.encode_job(track, format, artifact);
        tokio::spawn(job.run())
            .await
            .map_err(|e| TranscodeError::Task(e.to_string()))?
    }

    /// Bind a request to its artifact slot
    ///
    /// The attempt count is read here, when the request arrives, so an attempt
    /// that finishes before the job's task first runs still counts as waited on.
    fn encode_job(&self, track: &Track, format: OutputFormat, artifact: PathBuf) -> EncodeJob {
        let slot = self.slots.slot(&artifact);
        let seen = slot.attempts.load(Ordering::Acquire);
        EncodeJob {
            tool: self.tool.clone(),
            source: self.library_root.join(&track.path),
            artifact,
            id: track.id.clone(),
            format,
            slot,
            seen,
        }
    }

    /// Delete every artifact of `id`
    ///
    /// Takes each artifact's slot lock first so an in-flight encode completes
    /// before its output is removed. Returns the number of files deleted.
    pub async fn invalidate(&self, id: &str) -> usize {
        let mut removed = 0;
        for format in OutputFormat::ALL {
            let artifact = self.artifact_path(id, format);
            if self.remove_locked(&artifact).await {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(id, removed, "Invalidated cached artifacts");
        }
        removed
    }

    /// Delete artifacts whose id is not in `live_ids`
    ///
    /// In-progress `.part` files and unrecognized names are left alone.
    pub async fn sweep(&self, live_ids: &HashSet<String>) -> Result<usize, TranscodeError> {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.artifact_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some((id, _format)) = parse_artifact_name(&path) else {
                continue;
            };
            if !live_ids.contains(id) && self.remove_locked(&path).await {
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "Removed orphaned artifacts");
        }
        Ok(removed)
    }

    /// Delete leftover `.part` files from encodes interrupted by a crash
    ///
    /// Only safe before any request is served.
    pub async fn clear_partials(&self) -> Result<usize, TranscodeError> {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.artifact_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(PARTIAL_SUFFIX) {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            warn!(removed, "Removed partial artifacts from an earlier run");
        }
        Ok(removed)
    }

    async fn remove_locked(&self, artifact: &Path) -> bool {
        let slot = self.slots.slot(&artifact.to_path_buf());
        let _guard = slot.last_failure.lock().await;
        match tokio::fs::remove_file(artifact).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Remove {} failed: {}", artifact.display(), e);
                false
            }
        }
    }
}

/// `(id, format)` for a file named `<id>.<ext>` with a known extension
pub fn parse_artifact_name(path: &Path) -> Option<(&str, OutputFormat)> {
    let name = path.file_name()?.to_str()?;
    let (id, extension) = name.split_once('.')?;
    let format = OutputFormat::from_extension(extension)?;
    Some((id, format))
}

/// One encode attempt for one artifact, run on its own task
struct EncodeJob {
    tool: PathBuf,
    source: PathBuf,
    artifact: PathBuf,
    id: String,
    format: OutputFormat,
    slot: Arc<EncodeSlot>,
    /// Completed attempts when the request arrived
    seen: u64,
}

impl EncodeJob {
    async fn run(self) -> Result<Obtained, TranscodeError> {
        let mut last_failure = self.slot.last_failure.lock().await;

        if is_file(&self.artifact).await {
            return Ok(Obtained::Encoded(self.artifact));
        }

        // An attempt finished while we waited and left no artifact: report
        // its failure rather than starting a second attempt.
        if self.slot.attempts.load(Ordering::Acquire) != self.seen {
            if let Some(message) = last_failure.as_ref() {
                return Err(self.failure(message.clone()));
            }
        }

        let result = self.encode().await;
        *last_failure = result.as_ref().err().cloned();
        self.slot.attempts.fetch_add(1, Ordering::AcqRel);

        match result {
            Ok(()) => Ok(Obtained::Encoded(self.artifact)),
            Err(message) => Err(self.failure(message)),
        }
    }

    fn failure(&self, message: String) -> TranscodeError {
        TranscodeError::EncodeFailed {
            id: self.id.clone(),
            format: self.format,
            message,
        }
    }

    fn partial_path(&self) -> PathBuf {
        let mut name = self.artifact.as_os_str().to_owned();
        name.push(".");
        name.push(PARTIAL_SUFFIX);
        PathBuf::from(name)
    }

    async fn encode(&self) -> Result<(), String> {
        let partial = self.partial_path();
        info!(
            id = %self.id,
            format = %self.format,
            source = %self.source.display(),
            "Encoding"
        );

        let output = Command::new(&self.tool)
            .args(["-nostdin", "-v", "error", "-y", "-i"])
            .arg(&self.source)
            .args(["-vn", "-c:a", self.format.encoder()])
            .args(self.format.encoder_args())
            .args(["-f", self.format.container()])
            .arg(&partial)
            .stdin(Stdio::null())
            .output()
            .await;

        let failure = match output {
            Ok(output) if output.status.success() => {
                match tokio::fs::rename(&partial, &self.artifact).await {
                    Ok(()) => {
                        debug!(artifact = %self.artifact.display(), "Encode complete");
                        return Ok(());
                    }
                    Err(e) => format!("Move {} into place: {}", partial.display(), e),
                }
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    id = %self.id,
                    format = %self.format,
                    status = %output.status,
                    "Encoder failed: {}",
                    stderr.trim()
                );
                format!("{} exited with {}", self.tool.display(), output.status)
            }
            Err(e) => format!("{}: {}", self.tool.display(), e),
        };

        if let Err(e) = tokio::fs::remove_file(&partial).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Remove partial {} failed: {}", partial.display(), e);
            }
        }
        Err(failure)
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
