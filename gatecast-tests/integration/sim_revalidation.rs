//! Program boundaries and timeshift on simulated channels.
//!
//! The simulated EPG uses 30 minute slots. At the reference time the
//! current sports1 slot is entitled and the following one is blacked out
//! (every third slot is).

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use gatecast_core::errors::PlaybackError;
use gatecast_core::events::PlaybackEvent;
use gatecast_core::model::{Playable, PlaybackProperties};
use gatecast_core::orchestrator::test_mocks::{events_until, reference_time, wait_for_event};
use gatecast_core::traits::Clock;
use gatecast_sim::TechState;

use crate::support::SimPlayer;

fn is_program_changed(event: &PlaybackEvent) -> bool {
    matches!(event, PlaybackEvent::ProgramChanged(_))
}

#[tokio::test]
async fn test_boundary_reentitles_next_program() {
    let mut sim = SimPlayer::start();
    sim.play_until_settled(Playable::channel("news24"), PlaybackProperties::default())
        .await;
    let session_id = sim.player.session_id().await.unwrap();

    let Some(PlaybackEvent::ProgramChanged(first)) =
        wait_for_event(&mut sim.events, is_program_changed).await
    else {
        panic!("no initial program");
    };
    assert!(first.covers(reference_time()));

    sim.clock.advance(ChronoDuration::minutes(30));

    let Some(PlaybackEvent::ProgramChanged(second)) =
        wait_for_event(&mut sim.events, is_program_changed).await
    else {
        panic!("no program change at the boundary");
    };
    assert_eq!(second.start, first.end);
    assert_eq!(sim.player.current_program().await.unwrap(), Some(second));
    assert_eq!(sim.player.session_id().await.unwrap(), session_id);
    assert_eq!(sim.monitor.snapshot().state, TechState::Playing);
}

#[tokio::test]
async fn test_blacked_out_program_stops_playback() {
    let mut sim = SimPlayer::start();
    sim.play_until_settled(Playable::channel("sports1"), PlaybackProperties::default())
        .await;
    wait_for_event(&mut sim.events, is_program_changed)
        .await
        .unwrap();

    sim.clock.advance(ChronoDuration::minutes(30));

    let events = events_until(&mut sim.events, |event| matches!(event, PlaybackEvent::Stop))
        .await
        .unwrap();
    assert!(events.iter().any(|event| matches!(
        event,
        PlaybackEvent::Error(PlaybackError::EntitlementFailed { code, .. }) if code == "BLACKOUT"
    )));
    assert_eq!(sim.monitor.snapshot().state, TechState::Stopped);
    assert!(sim.player.session_info().await.unwrap().is_none());
}

#[tokio::test]
async fn test_timeshift_within_entitled_program_applies() {
    let mut sim = SimPlayer::start();
    sim.play_until_settled(Playable::channel("news24"), PlaybackProperties::default())
        .await;

    sim.player
        .set_timeshift_delay(Duration::from_secs(10 * 60))
        .await
        .unwrap();

    let snapshot = sim
        .wait_for_tech(|snapshot| snapshot.timeshift_delay_ms == 600_000)
        .await;
    let expected = (sim.clock.now() - ChronoDuration::minutes(10)).timestamp_millis();
    assert_eq!(snapshot.playhead_time_ms, Some(expected));
    assert_eq!(snapshot.state, TechState::Playing);
}

#[tokio::test]
async fn test_timeshift_into_blackout_stops_playback() {
    // Two slots after the reference the sports1 slot is entitled again.
    let mut sim = SimPlayer::start_at(reference_time() + ChronoDuration::minutes(65));
    sim.play_until_settled(Playable::channel("sports1"), PlaybackProperties::default())
        .await;
    wait_for_event(&mut sim.events, is_program_changed)
        .await
        .unwrap();

    // Twenty minutes back lands in the blacked out slot.
    sim.player
        .set_timeshift_delay(Duration::from_secs(20 * 60))
        .await
        .unwrap();

    let events = events_until(&mut sim.events, |event| matches!(event, PlaybackEvent::Stop))
        .await
        .unwrap();
    assert!(events.iter().any(|event| matches!(
        event,
        PlaybackEvent::Error(PlaybackError::EntitlementFailed { code, .. }) if code == "BLACKOUT"
    )));
    assert_eq!(sim.monitor.snapshot().timeshift_delay_ms, 0);
}
