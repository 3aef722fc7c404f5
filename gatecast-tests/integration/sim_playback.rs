//! Playback of simulated channels, programs and assets.

use chrono::Duration as ChronoDuration;
use gatecast_core::errors::PlaybackError;
use gatecast_core::events::PlaybackEvent;
use gatecast_core::model::{Playable, PlayableKind, PlaybackProperties, StartPolicy};
use gatecast_core::orchestrator::test_mocks::{events_until, wait_for_event};
use gatecast_core::policy::ResolvedStart;
use gatecast_core::traits::Clock;
use gatecast_sim::TechState;

use crate::support::{SimPlayer, event_names};

#[tokio::test]
async fn test_channel_joins_live_edge() {
    let mut sim = SimPlayer::start();
    let now_ms = sim.clock.now().timestamp_millis();

    let events = sim
        .play_until_settled(Playable::channel("news24"), PlaybackProperties::default())
        .await;

    assert_eq!(
        event_names(&events),
        vec!["init", "entitlement-load-start", "entitlement-granted", "loaded", "play"]
    );
    assert!(events.iter().any(|event| matches!(
        event,
        PlaybackEvent::Loaded { start: ResolvedStart::LiveEdge, .. }
    )));

    let snapshot = sim.monitor.snapshot();
    assert_eq!(snapshot.state, TechState::Playing);
    assert_eq!(snapshot.media_id.as_deref(), Some("news24"));
    assert_eq!(snapshot.playhead_time_ms, Some(now_ms));

    let info = sim.player.session_info().await.unwrap().unwrap();
    assert!(info.is_playing);
    assert!(info.revalidating);
    assert!(info.session_id.starts_with("live-"));
}

#[tokio::test]
async fn test_unsubscribed_channel_never_reaches_tech() {
    let mut sim = SimPlayer::start();

    let events = sim
        .play_until_settled(Playable::channel("premium"), PlaybackProperties::default())
        .await;

    assert_eq!(
        event_names(&events),
        vec!["init", "entitlement-load-start", "error"]
    );
    assert!(matches!(
        events.last(),
        Some(PlaybackEvent::Error(PlaybackError::EntitlementFailed { code, .. })) if code == "NOT_ENTITLED"
    ));
    assert_eq!(sim.monitor.snapshot().state, TechState::Idle);
    assert_eq!(sim.player.session_id().await.unwrap(), None);
}

#[tokio::test]
async fn test_asset_resumes_from_bookmark() {
    let mut sim = SimPlayer::start();

    let events = sim
        .play_until_settled(
            Playable::asset("big-buck-bunny"),
            PlaybackProperties::default().with_start_policy(StartPolicy::Bookmark),
        )
        .await;

    assert!(events.iter().any(|event| matches!(
        event,
        PlaybackEvent::Loaded { start: ResolvedStart::Bookmark(120_000), .. }
    )));
    let snapshot = sim.monitor.snapshot();
    assert_eq!(snapshot.position_ms, Some(120_000));
    assert_eq!(snapshot.playhead_time_ms, None);

    // Assets are never revalidated.
    let info = sim.player.session_info().await.unwrap().unwrap();
    assert!(!info.revalidating);
}

#[tokio::test]
async fn test_asset_without_bookmark_starts_from_beginning() {
    let mut sim = SimPlayer::start();

    sim.play_until_settled(
        Playable::asset("sintel"),
        PlaybackProperties::default().with_start_policy(StartPolicy::Bookmark),
    )
    .await;

    assert_eq!(sim.monitor.snapshot().position_ms, Some(0));
    let info = sim.player.session_info().await.unwrap().unwrap();
    assert_eq!(info.resolved_start, ResolvedStart::StartOfMedia);
}

#[tokio::test]
async fn test_channel_rights_gate_trick_play() {
    let mut sim = SimPlayer::start();

    sim.play_until_settled(Playable::channel("sports1"), PlaybackProperties::default())
        .await;

    assert!(!sim.player.can_seek_forward().await.unwrap());
    assert!(!sim.player.can_seek_back().await.unwrap());
    assert!(sim.player.can_pause().await.unwrap());

    sim.player.pause().await.unwrap();
    wait_for_event(&mut sim.events, |event| matches!(event, PlaybackEvent::Pause))
        .await
        .unwrap();
    assert_eq!(sim.monitor.snapshot().state, TechState::Paused);
}

#[tokio::test]
async fn test_seek_beyond_dvr_window_replays_covering_program() {
    let mut sim = SimPlayer::start();
    sim.play_until_settled(Playable::channel("news24"), PlaybackProperties::default())
        .await;

    let target = (sim.clock.now() - ChronoDuration::hours(3)).timestamp_millis();
    sim.player.seek_to_time(target).await.unwrap();

    let events = events_until(&mut sim.events, |event| matches!(event, PlaybackEvent::Play))
        .await
        .unwrap();
    assert!(events.iter().any(|event| matches!(
        event,
        PlaybackEvent::EntitlementLoadStart { kind: PlayableKind::Program }
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        PlaybackEvent::Loaded { start: ResolvedStart::ExplicitTime(ms), .. } if *ms == target
    )));

    let info = sim.player.session_info().await.unwrap().unwrap();
    let Playable::Program(program) = &info.playable else {
        panic!("expected a program session, got {}", info.playable);
    };
    assert_eq!(program.channel_id, "news24");
    assert_eq!(
        Some(program.clone()),
        sim.environment
            .epg()
            .program_at("news24", sim.clock.now() - ChronoDuration::hours(3))
    );
    assert_eq!(sim.monitor.snapshot().playhead_time_ms, Some(target));
}

#[tokio::test]
async fn test_seek_inside_dvr_window_stays_on_channel() {
    let mut sim = SimPlayer::start();
    sim.play_until_settled(Playable::channel("news24"), PlaybackProperties::default())
        .await;
    let session_id = sim.player.session_id().await.unwrap();

    let target = (sim.clock.now() - ChronoDuration::minutes(20)).timestamp_millis();
    sim.player.seek_to_time(target).await.unwrap();

    sim.wait_for_tech(|snapshot| snapshot.playhead_time_ms == Some(target))
        .await;
    assert_eq!(sim.player.session_id().await.unwrap(), session_id);
}
