//! Offline playback from grants stored beside downloaded manifests.

use std::path::PathBuf;
use std::sync::Arc;

use gatecast_core::errors::PlaybackError;
use gatecast_core::events::PlaybackEvent;
use gatecast_core::model::{Playable, PlaybackProperties, StartPolicy};
use gatecast_core::offline::JsonGrantStore;
use gatecast_core::orchestrator::test_mocks::reference_time;
use gatecast_core::policy::ResolvedStart;
use gatecast_sim::TechState;
use tempfile::TempDir;

use crate::support::{SimPlayer, event_names};

fn downloaded_manifest(root: &TempDir, directory_name: &str) -> PathBuf {
    let directory = root.path().join(directory_name);
    std::fs::create_dir_all(&directory).unwrap();
    let manifest = directory.join("manifest.mpd");
    std::fs::write(&manifest, "<MPD/>").unwrap();
    manifest
}

#[tokio::test]
async fn test_downloaded_asset_plays_from_stored_grant() {
    let root = TempDir::new().unwrap();
    let store = JsonGrantStore::default();
    let mut sim = SimPlayer::with_grant_store(reference_time(), Arc::new(store.clone()));

    // Download directories are not named after the asset.
    let manifest = downloaded_manifest(&root, "download-0001");
    let grant = sim
        .collaborators
        .gateway
        .play_vod("big-buck-bunny")
        .await
        .unwrap();
    store.store_grant(&manifest, &grant).unwrap();

    let events = sim
        .play_until_settled(
            Playable::offline(manifest.clone()),
            PlaybackProperties::default().with_start_policy(StartPolicy::Bookmark),
        )
        .await;

    assert_eq!(
        event_names(&events),
        vec!["init", "entitlement-load-start", "entitlement-granted", "loaded", "play"]
    );
    assert!(events.iter().any(|event| matches!(
        event,
        PlaybackEvent::Loaded { session_id, start: ResolvedStart::Bookmark(120_000) }
            if session_id.starts_with("offline-")
    )));

    let snapshot = sim.monitor.snapshot();
    assert_eq!(snapshot.state, TechState::Playing);
    assert_eq!(snapshot.media_id.as_deref(), Some("big-buck-bunny"));
    assert_eq!(snapshot.playhead_time_ms, None);
    assert!(!sim.player.session_info().await.unwrap().unwrap().revalidating);
}

#[tokio::test]
async fn test_manifest_without_grant_fails() {
    let root = TempDir::new().unwrap();
    let mut sim = SimPlayer::start();
    let manifest = downloaded_manifest(&root, "sintel");

    let events = sim
        .play_until_settled(Playable::offline(manifest.clone()), PlaybackProperties::default())
        .await;

    assert!(matches!(
        events.last(),
        Some(PlaybackEvent::Error(PlaybackError::GenericPlaybackFailure { message }))
            if message.contains("entitlement.json")
    ));
    assert_eq!(sim.monitor.snapshot().state, TechState::Idle);
}
