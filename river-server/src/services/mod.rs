//! Services for river-server

pub mod id_allocator;
pub mod keyed_locks;
pub mod library;
pub mod library_reconciler;
pub mod metadata_prober;
pub mod track_index;
pub mod transcode_cache;

pub use library::{Library, LibraryError, LibrarySettings, ReloadSummary, StreamSource};
pub use library_reconciler::{LibraryReconciler, ReconcileError, ReconcileStats};
pub use metadata_prober::{MetadataProber, ProbeError, ProbedMetadata};
pub use track_index::{SnapshotStatus, TrackIndex};
pub use transcode_cache::{Obtained, TranscodeCache, TranscodeError};
