//! Integration tests for library reconciliation
//!
//! Tests cover:
//! - Audio admission (no audio stream, low probe score, unparsable output)
//! - Identifier stability across reloads and restarts
//! - Artifact invalidation on modification and deletion, including while an
//!   encode of the old content is still running
//! - Symlinked files indexed by their target
//! - Snapshot handling (root mismatch, persistence failure)
//! - Artifact directory housekeeping

#![cfg(unix)]

mod helpers;

use helpers::{flac, low_score, no_audio, TestEnv};
use river_server::services::Library;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

async fn id_of(library: &Library, path: &str) -> String {
    library
        .index()
        .await
        .by_path(path)
        .unwrap_or_else(|| panic!("{} not indexed", path))
        .id
        .clone()
}

#[tokio::test]
#[serial]
async fn test_reload_admits_only_audio() {
    let env = TestEnv::new();
    env.write_track("Artist/Album/01.flac", &flac("Artist", "Album", 1, "One"));
    env.write_track("Artist/Album/cover.jpg", &no_audio());
    env.write_track("Artist/Album/guess.mp3", &low_score());
    env.write_track("notes.txt", "these are not the droids");

    let library = env.open().await;
    let summary = library.reload().await.unwrap();

    assert_eq!(summary.stats.scanned, 4);
    assert_eq!(summary.stats.added, 1);
    assert_eq!(summary.stats.skipped, 3);
    assert!(summary.persisted);

    let index = library.index().await;
    assert_eq!(index.len(), 1);
    let track = index.by_path("Artist/Album/01.flac").unwrap();
    assert_eq!(track.tags.artist, "Artist");
    assert_eq!(track.tags.track, 1);
    assert_eq!(track.container_format, "flac");
    assert_eq!(track.id.len(), 8);
    assert!(env.data.join(".db.json").is_file());
}

#[tokio::test]
#[serial]
async fn test_ids_stable_across_reloads() {
    let env = TestEnv::new();
    env.write_track("a.flac", &flac("A", "X", 1, "a"));
    env.write_track("b.flac", &flac("B", "X", 1, "b"));

    let library = env.open().await;
    library.reload().await.unwrap();
    let a = id_of(&library, "a.flac").await;
    let b = id_of(&library, "b.flac").await;
    assert_ne!(a, b);

    let summary = library.reload().await.unwrap();
    assert_eq!(summary.stats.unchanged, 2);
    assert_eq!(summary.stats.added, 0);
    assert_eq!(id_of(&library, "a.flac").await, a);
    assert_eq!(id_of(&library, "b.flac").await, b);
}

#[tokio::test]
#[serial]
async fn test_modified_file_keeps_id_and_loses_artifacts() {
    let env = TestEnv::new();
    env.write_track("song.flac", &flac("Artist", "Album", 1, "Before"));

    let library = env.open().await;
    library.reload().await.unwrap();
    let id = id_of(&library, "song.flac").await;

    library.stream(&id, "mp3").await.unwrap();
    assert!(env.artifact(&id, "mp3").is_file());

    env.rewrite_track("song.flac", &flac("Artist", "Album", 1, "After"));
    let summary = library.reload().await.unwrap();

    assert_eq!(summary.stats.updated, 1);
    assert_eq!(summary.artifacts_removed, 1);
    assert!(!env.artifact(&id, "mp3").exists());

    let track = library.track(&id).await.unwrap();
    assert_eq!(track.tags.title, "After");

    // Fresh request re-encodes from the new content
    let source = library.stream(&id, "mp3").await.unwrap();
    let served = std::fs::read_to_string(source.path()).unwrap();
    assert!(served.contains("After"));
    assert_eq!(env.encoder_invocations(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_reload_during_encode_drops_stale_artifact() {
    let env = TestEnv::new();
    env.write_track("song.flac", &flac("Artist", "Album", 1, "Before"));

    let library = Arc::new(env.open().await);
    library.reload().await.unwrap();
    let id = id_of(&library, "song.flac").await;

    let encoding = {
        let library = Arc::clone(&library);
        let id = id.clone();
        tokio::spawn(async move { library.stream(&id, "mp3").await.map(|_| ()) })
    };
    // Change the source while the encoder is still running
    tokio::time::timeout(Duration::from_secs(5), async {
        while env.encoder_invocations() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("encoder never started");
    assert!(!env.artifact(&id, "mp3").exists());
    env.rewrite_track("song.flac", &flac("Artist", "Album", 1, "After"));

    let summary = library.reload().await.unwrap();
    assert!(encoding.await.unwrap().is_ok());
    assert_eq!(summary.stats.updated, 1);
    assert_eq!(summary.artifacts_removed, 1);
    assert!(!env.artifact(&id, "mp3").exists());

    let source = library.stream(&id, "mp3").await.unwrap();
    let served = std::fs::read_to_string(source.path()).unwrap();
    assert!(served.contains("After"));
    assert_eq!(env.encoder_invocations(), 2);
}

#[tokio::test]
#[serial]
async fn test_symlinked_file_is_indexed() {
    let env = TestEnv::new();
    let outside = env.dir.path().join("elsewhere");
    std::fs::create_dir_all(&outside).unwrap();
    let target = outside.join("song.flac");
    std::fs::write(&target, flac("Artist", "Album", 1, "Linked")).unwrap();
    std::os::unix::fs::symlink(&target, env.library.join("linked.flac")).unwrap();

    let library = env.open().await;
    let summary = library.reload().await.unwrap();

    assert_eq!(summary.stats.scanned, 1);
    assert_eq!(summary.tracks, 1);
    let id = id_of(&library, "linked.flac").await;
    assert_eq!(library.track(&id).await.unwrap().tags.title, "Linked");
}

#[tokio::test]
#[serial]
async fn test_deleted_file_drops_track_and_artifacts() {
    let env = TestEnv::new();
    let path = env.write_track("gone.flac", &flac("Artist", "Album", 1, "Gone"));
    env.write_track("kept.flac", &flac("Artist", "Album", 2, "Kept"));

    let library = env.open().await;
    library.reload().await.unwrap();
    let gone = id_of(&library, "gone.flac").await;
    library.stream(&gone, "opus").await.unwrap();
    assert!(env.artifact(&gone, "opus").is_file());

    std::fs::remove_file(&path).unwrap();
    let summary = library.reload().await.unwrap();

    assert_eq!(summary.stats.removed, 1);
    assert!(library.track(&gone).await.is_err());
    assert!(!env.artifact(&gone, "opus").exists());
    assert_eq!(library.index().await.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_restart_reuses_snapshot_without_probing() {
    let env = TestEnv::new();
    env.write_track("song.flac", &flac("Artist", "Album", 1, "Song"));

    let id = {
        let library = env.open().await;
        library.reload().await.unwrap();
        id_of(&library, "song.flac").await
    };

    // A probe tool that cannot run would drop every probed file
    let mut settings = env.settings();
    settings.probe_tool = env.dir.path().join("missing-probe");
    let library = Library::open(settings).await.unwrap();
    assert_eq!(library.track(&id).await.unwrap().path, "song.flac");

    let summary = library.reload().await.unwrap();
    assert_eq!(summary.stats.unchanged, 1);
    assert_eq!(summary.stats.skipped, 0);
    assert_eq!(id_of(&library, "song.flac").await, id);
}

#[tokio::test]
#[serial]
async fn test_snapshot_for_other_root_is_discarded() {
    let env = TestEnv::new();
    env.write_track("song.flac", &flac("Artist", "Album", 1, "Song"));
    {
        let library = env.open().await;
        library.reload().await.unwrap();
    }

    let other = env.dir.path().join("other-library");
    std::fs::create_dir_all(&other).unwrap();
    let mut settings = env.settings();
    settings.library_root = other;

    let library = Library::open(settings).await.unwrap();
    assert!(library.index().await.is_empty());

    let summary = library.reload().await.unwrap();
    assert_eq!(summary.stats.scanned, 0);
    assert_eq!(summary.tracks, 0);
}

#[tokio::test]
#[serial]
async fn test_persist_failure_keeps_published_index() {
    let env = TestEnv::new();
    env.write_track("song.flac", &flac("Artist", "Album", 1, "Song"));
    // Snapshot path occupied by a non-empty directory
    std::fs::create_dir_all(env.data.join(".db.json/blocker")).unwrap();

    let library = env.open().await;
    let summary = library.reload().await.unwrap();

    assert!(!summary.persisted);
    assert_eq!(library.index().await.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_artifact_directory_housekeeping() {
    let env = TestEnv::new();
    env.write_track("song.flac", &flac("Artist", "Album", 1, "Song"));
    std::fs::create_dir_all(env.artifact_dir()).unwrap();
    std::fs::write(env.artifact("zzzzzzzz", "mp3.part"), b"interrupted").unwrap();
    std::fs::write(env.artifact("zzzzzzzz", "opus"), b"orphan").unwrap();
    std::fs::write(env.artifact_dir().join("README"), b"keep me").unwrap();

    let library = env.open().await;
    assert!(!env.artifact("zzzzzzzz", "mp3.part").exists());

    let summary = library.reload().await.unwrap();
    assert_eq!(summary.artifacts_removed, 1);
    assert!(!env.artifact("zzzzzzzz", "opus").exists());
    assert!(env.artifact_dir().join("README").exists());
}

#[tokio::test]
#[serial]
async fn test_missing_root_fails_open() {
    let env = TestEnv::new();
    let mut settings = env.settings();
    settings.library_root = env.dir.path().join("nowhere");
    assert!(Library::open(settings).await.is_err());
}

#[tokio::test]
#[serial]
async fn test_root_removed_after_open_fails_reload() {
    let env = TestEnv::new();
    env.write_track("song.flac", &flac("Artist", "Album", 1, "Song"));
    let library = env.open().await;
    library.reload().await.unwrap();

    std::fs::remove_dir_all(&env.library).unwrap();
    assert!(library.reload().await.is_err());
    // Previous index stays published
    assert_eq!(library.index().await.len(), 1);
}
