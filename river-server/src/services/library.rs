//! Library service
//!
//! Owns the published [`TrackIndex`], the reconciler, and the transcode cache.
//! Constructed once at startup and shared with the HTTP layer.
//!
//! # Concurrency
//!
//! - Readers clone the current `Arc<TrackIndex>` under a brief shared lock
//! - Reloads are serialized by `reload_lock`, build the next index without
//!   holding the index lock, and take the write lock only for the swap
//! - Artifact deletions go through the cache's per-artifact locks

use crate::models::{OutputFormat, Track, UnknownFormat};
use crate::services::library_reconciler::{LibraryReconciler, ReconcileError, ReconcileStats};
use crate::services::metadata_prober::MetadataProber;
use crate::services::track_index::{SnapshotStatus, TrackIndex};
use crate::services::transcode_cache::{Obtained, TranscodeCache, TranscodeError};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

/// Snapshot file name inside the data directory
pub const INDEX_FILE_NAME: &str = ".db.json";

/// Artifact directory name inside the data directory
pub const ARTIFACT_DIR_NAME: &str = ".stream";

/// Library errors
#[derive(Debug, Error)]
pub enum LibraryError {
    /// No track with this id
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    #[error(transparent)]
    UnknownFormat(#[from] UnknownFormat),

    #[error("Reload failed: {0}")]
    Reload(#[from] ReconcileError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    /// Library root or data directory unusable at startup
    #[error("Library setup failed for {path}: {source}")]
    Setup {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Paths and tools the library runs with
#[derive(Debug, Clone)]
pub struct LibrarySettings {
    pub library_root: PathBuf,
    /// Holds the index snapshot and the artifact directory
    pub data_dir: PathBuf,
    pub probe_tool: PathBuf,
    pub transcode_tool: PathBuf,
    pub probe_concurrency: usize,
}

impl LibrarySettings {
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(INDEX_FILE_NAME)
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.data_dir.join(ARTIFACT_DIR_NAME)
    }
}

/// Summary of one reload, returned to the caller
#[derive(Debug, Clone, Serialize)]
pub struct ReloadSummary {
    #[serde(flatten)]
    pub stats: ReconcileStats,
    pub tracks: usize,
    pub artifacts_removed: usize,
    /// False when the snapshot could not be written
    pub persisted: bool,
}

/// A resolved stream request
#[derive(Debug, Clone)]
pub struct StreamSource {
    pub track: Arc<Track>,
    pub format: OutputFormat,
    pub obtained: Obtained,
}

impl StreamSource {
    pub fn path(&self) -> &Path {
        self.obtained.path()
    }
}

/// The library service
pub struct Library {
    library_root: PathBuf,
    index_path: PathBuf,
    index: RwLock<Arc<TrackIndex>>,
    reload_lock: Mutex<()>,
    reconciler: LibraryReconciler,
    cache: TranscodeCache,
}

impl Library {
    /// Open the library: prepare the data directory and load the snapshot
    ///
    /// Does not reconcile; call [`Library::reload`] before serving.
    pub async fn open(settings: LibrarySettings) -> Result<Self, LibraryError> {
        let library_root = tokio::fs::canonicalize(&settings.library_root)
            .await
            .map_err(|source| LibraryError::Setup {
                path: settings.library_root.clone(),
                source,
            })?;

        let artifact_dir = settings.artifact_dir();
        tokio::fs::create_dir_all(&artifact_dir)
            .await
            .map_err(|source| LibraryError::Setup {
                path: artifact_dir.clone(),
                source,
            })?;

        let index_path = settings.index_path();
        let (index, status) = TrackIndex::load(&index_path, &library_root).await;
        match &status {
            SnapshotStatus::Loaded(count) => info!("Loaded index snapshot with {} tracks", count),
            SnapshotStatus::Missing => info!("No index snapshot; first reload indexes everything"),
            SnapshotStatus::RootMismatch { persisted } => warn!(
                "Index snapshot is for {}, not {}; rebuilding",
                persisted.display(),
                library_root.display()
            ),
            SnapshotStatus::Invalid(reason) => warn!("Index snapshot invalid ({}); rebuilding", reason),
        }

        let cache = TranscodeCache::new(&settings.transcode_tool, &library_root, &artifact_dir);
        cache.clear_partials().await?;

        let reconciler = LibraryReconciler::new(
            MetadataProber::new(&settings.probe_tool),
            settings.probe_concurrency,
        );

        Ok(Self {
            library_root,
            index_path,
            index: RwLock::new(Arc::new(index)),
            reload_lock: Mutex::new(()),
            reconciler,
            cache,
        })
    }

    /// Canonical library root
    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    pub fn cache(&self) -> &TranscodeCache {
        &self.cache
    }

    /// Current published index
    pub async fn index(&self) -> Arc<TrackIndex> {
        Arc::clone(&*self.index.read().await)
    }

    /// Look up a track by id
    pub async fn track(&self, id: &str) -> Result<Arc<Track>, LibraryError> {
        self.index
            .read()
            .await
            .by_id(id)
            .cloned()
            .ok_or_else(|| LibraryError::TrackNotFound(id.to_string()))
    }

    /// Reconcile the index with the library on disk and publish the result
    pub async fn reload(&self) -> Result<ReloadSummary, LibraryError> {
        let _reloading = self.reload_lock.lock().await;

        let previous = self.index().await;
        let reconciliation = self.reconciler.reconcile(&previous).await?;

        // Stale artifacts go before the swap so no reader of the new index
        // can be served pre-change content.
        let mut artifacts_removed = 0;
        for id in &reconciliation.refreshed {
            artifacts_removed += self.cache.invalidate(id).await;
        }

        let next = Arc::new(reconciliation.index);
        *self.index.write().await = Arc::clone(&next);

        for id in &reconciliation.removed {
            artifacts_removed += self.cache.invalidate(id).await;
        }
        let live: HashSet<String> = next.list().iter().map(|t| t.id.clone()).collect();
        match self.cache.sweep(&live).await {
            Ok(swept) => artifacts_removed += swept,
            Err(e) => warn!("Artifact sweep failed: {}", e),
        }

        let persisted = match next.persist(&self.index_path).await {
            Ok(()) => true,
            Err(e) => {
                error!("Persisting index failed (in-memory index kept): {}", e);
                false
            }
        };

        Ok(ReloadSummary {
            stats: reconciliation.stats,
            tracks: next.len(),
            artifacts_removed,
            persisted,
        })
    }

    /// Resolve a stream request to a complete file on disk
    pub async fn stream(&self, id: &str, format: &str) -> Result<StreamSource, LibraryError> {
        let track = self.track(id).await?;
        let format: OutputFormat = format.parse()?;
        let obtained = self.cache.obtain(&track, format).await?;
        Ok(StreamSource {
            track,
            format,
            obtained,
        })
    }
}
