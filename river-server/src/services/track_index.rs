//! Track index
//!
//! Holds the path→Track and id→Track mappings plus the sorted listing. All
//! three are built together by [`TrackIndex::from_tracks`] and never mutated
//! afterwards; a reload publishes a whole new index.
//!
//! The index persists as a JSON snapshot so identifiers survive restarts
//! without re-probing every file.

use crate::models::Track;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Snapshot write failure
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Serialize index failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Write index {path} failed: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of loading a persisted snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotStatus {
    /// Snapshot loaded with this many tracks
    Loaded(usize),
    /// No snapshot file yet
    Missing,
    /// Snapshot belongs to a different library root
    RootMismatch { persisted: PathBuf },
    /// Snapshot unreadable or internally inconsistent
    Invalid(String),
}

/// On-disk form of the index
#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    library_root: PathBuf,
    /// path → track
    tracks: BTreeMap<String, Track>,
    /// id → path
    ids: BTreeMap<String, String>,
}

/// Immutable track index
#[derive(Debug, Clone)]
pub struct TrackIndex {
    library_root: PathBuf,
    by_path: HashMap<String, Arc<Track>>,
    by_id: HashMap<String, Arc<Track>>,
    sorted: Vec<Arc<Track>>,
}

impl TrackIndex {
    /// Index with no tracks
    pub fn empty(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
            by_path: HashMap::new(),
            by_id: HashMap::new(),
            sorted: Vec::new(),
        }
    }

    /// Build all mappings and the sorted listing from one set of tracks
    ///
    /// Callers guarantee unique paths and unique ids.
    pub fn from_tracks(
        library_root: impl Into<PathBuf>,
        tracks: impl IntoIterator<Item = Arc<Track>>,
    ) -> Self {
        let mut by_path = HashMap::new();
        let mut by_id = HashMap::new();
        let mut sorted = Vec::new();

        for track in tracks {
            by_id.insert(track.id.clone(), Arc::clone(&track));
            by_path.insert(track.path.clone(), Arc::clone(&track));
            sorted.push(track);
        }
        sorted.sort_by(|a, b| a.listing_order(b));

        Self {
            library_root: library_root.into(),
            by_path,
            by_id,
            sorted,
        }
    }

    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    /// Tracks in listing order
    pub fn list(&self) -> &[Arc<Track>] {
        &self.sorted
    }

    pub fn by_id(&self, id: &str) -> Option<&Arc<Track>> {
        self.by_id.get(id)
    }

    pub fn by_path(&self, path: &str) -> Option<&Arc<Track>> {
        self.by_path.get(path)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Write the snapshot to `path`
    ///
    /// Writes a sibling temporary file first and renames it over `path`, so a
    /// crash never leaves a truncated snapshot behind.
    pub async fn persist(&self, path: &Path) -> Result<(), PersistError> {
        let snapshot = IndexSnapshot {
            library_root: self.library_root.clone(),
            tracks: self
                .by_path
                .iter()
                .map(|(p, t)| (p.clone(), Track::clone(t)))
                .collect(),
            ids: self
                .by_id
                .iter()
                .map(|(id, t)| (id.clone(), t.path.clone()))
                .collect(),
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        let write_err = |source| PersistError::Write {
            path: path.to_path_buf(),
            source,
        };
        tokio::fs::write(&temp, &bytes).await.map_err(write_err)?;
        if let Err(e) = tokio::fs::rename(&temp, path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(write_err(e));
        }
        Ok(())
    }

    /// Load a snapshot for `library_root`
    ///
    /// Never fails: any problem yields an empty index plus a status explaining
    /// why, which forces the next reload to rebuild from scratch.
    pub async fn load(path: &Path, library_root: &Path) -> (Self, SnapshotStatus) {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No index snapshot at {}", path.display());
                return (Self::empty(library_root), SnapshotStatus::Missing);
            }
            Err(e) => {
                warn!("Read index snapshot {} failed: {}", path.display(), e);
                return (
                    Self::empty(library_root),
                    SnapshotStatus::Invalid(e.to_string()),
                );
            }
        };

        match Self::from_snapshot_bytes(&bytes, library_root) {
            Ok(index) => {
                let status = SnapshotStatus::Loaded(index.len());
                (index, status)
            }
            Err(status) => {
                warn!(
                    snapshot = %path.display(),
                    ?status,
                    "Discarding index snapshot; full rebuild required"
                );
                (Self::empty(library_root), status)
            }
        }
    }

    fn from_snapshot_bytes(bytes: &[u8], library_root: &Path) -> Result<Self, SnapshotStatus> {
        let snapshot: IndexSnapshot =
            serde_json::from_slice(bytes).map_err(|e| SnapshotStatus::Invalid(e.to_string()))?;

        if snapshot.library_root != library_root {
            return Err(SnapshotStatus::RootMismatch {
                persisted: snapshot.library_root,
            });
        }

        if snapshot.ids.len() != snapshot.tracks.len() {
            return Err(SnapshotStatus::Invalid(format!(
                "{} ids for {} tracks",
                snapshot.ids.len(),
                snapshot.tracks.len()
            )));
        }
        for (id, path) in &snapshot.ids {
            match snapshot.tracks.get(path) {
                Some(track) if &track.id == id => {}
                _ => {
                    return Err(SnapshotStatus::Invalid(format!(
                        "id {} does not match track at {}",
                        id, path
                    )))
                }
            }
        }
        if let Some((key, track)) = snapshot.tracks.iter().find(|(k, t)| *k != &t.path) {
            return Err(SnapshotStatus::Invalid(format!(
                "track keyed {} claims path {}",
                key, track.path
            )));
        }

        Ok(Self::from_tracks(
            snapshot.library_root,
            snapshot.tracks.into_values().map(Arc::new),
        ))
    }
}
