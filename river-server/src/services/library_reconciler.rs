//! Library reconciliation
//!
//! Walks the library root and produces the next [`TrackIndex`] from the
//! previous one:
//! - Unchanged files (recorded mtime not older than on disk) keep their Track
//! - New or modified files are probed; known paths keep their id
//! - Files that fail probing are left out of the index
//! - Paths that vanished are dropped
//!
//! The walk and the probes never touch the published index; the caller swaps
//! the result in.

use crate::models::Track;
use crate::services::id_allocator::{self, AllocationError, ID_LENGTH};
use crate::services::metadata_prober::{MetadataProber, ProbeError, ProbedMetadata};
use crate::services::track_index::TrackIndex;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Reconciliation errors (the whole reload fails)
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Library root does not exist
    #[error("Library root not found: {0}")]
    RootNotFound(PathBuf),

    /// Library root exists but is not a directory
    #[error("Library root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Walk {path} failed: {source}")]
    Walk {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Walk task failed: {0}")]
    Task(String),
}

/// Counters describing one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Regular files found under the root
    pub scanned: usize,
    /// Files whose Track was kept without probing
    pub unchanged: usize,
    /// Newly indexed paths
    pub added: usize,
    /// Known paths re-probed after a modification
    pub updated: usize,
    /// Previously indexed paths no longer in the index
    pub removed: usize,
    /// Probed files excluded as non-audio or unreadable
    pub skipped: usize,
}

/// Result of a reconciliation, not yet published
#[derive(Debug)]
pub struct Reconciliation {
    pub index: TrackIndex,
    /// Ids kept across a re-probe; their artifacts are stale
    pub refreshed: Vec<String>,
    /// Ids retired with their paths
    pub removed: Vec<String>,
    pub stats: ReconcileStats,
}

/// One regular file found by the walk
#[derive(Debug, Clone)]
struct LibraryFile {
    relative: String,
    absolute: PathBuf,
    modified_at: DateTime<Utc>,
}

/// Library reconciler
pub struct LibraryReconciler {
    prober: MetadataProber,
    probe_concurrency: usize,
}

impl LibraryReconciler {
    pub fn new(prober: MetadataProber, probe_concurrency: usize) -> Self {
        Self {
            prober,
            probe_concurrency: probe_concurrency.max(1),
        }
    }

    /// Build the next index from the library on disk and `previous`
    pub async fn reconcile(&self, previous: &TrackIndex) -> Result<Reconciliation, ReconcileError> {
        let root = previous.library_root().to_path_buf();
        let files = tokio::task::spawn_blocking(move || walk_library(&root))
            .await
            .map_err(|e| ReconcileError::Task(e.to_string()))??;

        let mut stats = ReconcileStats {
            scanned: files.len(),
            ..ReconcileStats::default()
        };

        let mut tracks: Vec<Arc<Track>> = Vec::with_capacity(files.len());
        let mut to_probe = Vec::new();
        for file in files {
            match previous.by_path(&file.relative) {
                Some(track) if track.modified_at >= file.modified_at => {
                    tracks.push(Arc::clone(track));
                    stats.unchanged += 1;
                }
                _ => to_probe.push(file),
            }
        }

        debug!(
            unchanged = stats.unchanged,
            to_probe = to_probe.len(),
            "Library walk complete"
        );

        let mut probed: Vec<(LibraryFile, Result<ProbedMetadata, ProbeError>)> =
            stream::iter(to_probe)
                .map(|file| async move {
                    let result = self.prober.probe(&file.absolute).await;
                    (file, result)
                })
                .buffer_unordered(self.probe_concurrency)
                .collect()
                .await;
        // Deterministic id assignment regardless of probe completion order
        probed.sort_by(|a, b| a.0.relative.cmp(&b.0.relative));

        // Ids of the previous index stay reserved so a retired id is never
        // handed to a different path in the same pass.
        let mut used_ids: HashSet<String> = previous.list().iter().map(|t| t.id.clone()).collect();
        let mut refreshed = Vec::new();

        for (file, result) in probed {
            let meta = match result {
                Ok(meta) => meta,
                Err(ProbeError::NotAudio(reason)) => {
                    debug!(path = %file.relative, %reason, "Skipping non-audio file");
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(path = %file.relative, "Skipping file: {}", e);
                    stats.skipped += 1;
                    continue;
                }
            };

            let id = match previous.by_path(&file.relative) {
                Some(existing) => {
                    refreshed.push(existing.id.clone());
                    stats.updated += 1;
                    existing.id.clone()
                }
                None => {
                    stats.added += 1;
                    allocate_unique(&mut used_ids)?
                }
            };

            tracks.push(Arc::new(Track {
                id,
                path: file.relative,
                modified_at: file.modified_at,
                tags: meta.tags,
                container_format: meta.container_format,
                stream_codec: meta.stream_codec,
                duration_secs: meta.duration_secs,
            }));
        }

        let index = TrackIndex::from_tracks(previous.library_root(), tracks);

        let removed: Vec<String> = previous
            .list()
            .iter()
            .filter(|t| index.by_path(&t.path).is_none())
            .map(|t| t.id.clone())
            .collect();
        stats.removed = removed.len();

        info!(
            tracks = index.len(),
            scanned = stats.scanned,
            added = stats.added,
            updated = stats.updated,
            removed = stats.removed,
            skipped = stats.skipped,
            "Reconciliation complete"
        );

        Ok(Reconciliation {
            index,
            refreshed,
            removed,
            stats,
        })
    }
}

fn allocate_unique(used: &mut HashSet<String>) -> Result<String, AllocationError> {
    loop {
        let id = id_allocator::allocate(ID_LENGTH)?;
        if used.insert(id.clone()) {
            return Ok(id);
        }
        warn!(%id, "Allocated id already in use; drawing again");
    }
}

/// Collect every regular file under `root`, including symlinks to files
///
/// Unreadable entries below the root are logged and skipped; an unusable root
/// fails the walk.
fn walk_library(root: &Path) -> Result<Vec<LibraryFile>, ReconcileError> {
    let metadata = std::fs::metadata(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ReconcileError::RootNotFound(root.to_path_buf()),
        _ => ReconcileError::Walk {
            path: root.to_path_buf(),
            source: e,
        },
    })?;
    if !metadata.is_dir() {
        return Err(ReconcileError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }

        // Symlinks count by their target; links to directories are not walked
        let metadata = match std::fs::metadata(entry.path()) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        let Some(relative) = relative_key(root, entry.path()) else {
            warn!("Skipping non UTF-8 path: {}", entry.path().display());
            continue;
        };
        let modified_at = match metadata.modified() {
            Ok(time) => DateTime::<Utc>::from(time),
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        files.push(LibraryFile {
            relative,
            absolute: entry.path().to_path_buf(),
            modified_at,
        });
    }

    Ok(files)
}

/// `/`-separated path of `path` relative to `root`
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    let parts = parts?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
