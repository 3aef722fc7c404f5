//! End-to-end tests of the orchestrator actor against mock collaborators.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};

    use crate::config::GatecastConfig;
    use crate::errors::{MetadataError, PlaybackError};
    use crate::events::{EventSubscription, PlaybackEvent};
    use crate::model::{Grant, Playable, PlayableKind, PlaybackProperties, Program, StartPolicy};
    use crate::orchestrator::test_mocks::{
        EVENT_TIMEOUT, GatewayCall, MockCollaborators, RecordingTech, TechInstruction,
        events_until, wait_for_event,
    };
    use crate::orchestrator::{PlayerHandle, spawn_orchestrator};
    use crate::policy::ResolvedStart;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
    }

    fn ms(time: DateTime<Utc>) -> i64 {
        time.timestamp_millis()
    }

    fn early() -> Program {
        Program::new("ch1", "early").with_schedule(at(19, 0), at(19, 30))
    }

    fn evening() -> Program {
        Program::new("ch1", "evening").with_schedule(at(19, 30), at(20, 30))
    }

    fn late() -> Program {
        Program::new("ch1", "late").with_schedule(at(20, 30), at(22, 0))
    }

    fn afternoon() -> Program {
        Program::new("ch1", "afternoon").with_schedule(at(14, 0), at(16, 0))
    }

    struct Fixture {
        mocks: MockCollaborators,
        tech: RecordingTech,
        player: PlayerHandle,
        events: EventSubscription,
    }

    fn fixture() -> Fixture {
        let mocks = MockCollaborators::new();
        let tech = RecordingTech::new();
        let player = spawn_orchestrator(
            GatecastConfig::for_testing(),
            mocks.collaborators(),
            tech.clone(),
        );
        let events = player.subscribe();
        Fixture {
            mocks,
            tech,
            player,
            events,
        }
    }

    fn is_play(event: &PlaybackEvent) -> bool {
        matches!(event, PlaybackEvent::Play)
    }

    fn is_loaded(event: &PlaybackEvent) -> bool {
        matches!(event, PlaybackEvent::Loaded { .. })
    }

    fn is_error(event: &PlaybackEvent) -> bool {
        matches!(event, PlaybackEvent::Error(_))
    }

    fn program_changed_to(program_id: &'static str) -> impl Fn(&PlaybackEvent) -> bool {
        move |event| {
            matches!(event, PlaybackEvent::ProgramChanged(program) if program.program_id == program_id)
        }
    }

    async fn eventually<F: Fn() -> bool>(check: F) -> bool {
        let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }

    async fn play(fixture: &Fixture, playable: Playable, properties: PlaybackProperties) {
        fixture.player.play(playable, properties).await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_plays_from_live_edge_and_tracks_programs() {
        let mut f = fixture();
        f.mocks.metadata.add_program(evening());
        f.mocks.metadata.add_program(late());

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;

        let events = events_until(&mut f.events, is_play).await.unwrap();
        assert_eq!(
            events,
            vec![
                PlaybackEvent::Init,
                PlaybackEvent::EntitlementLoadStart {
                    kind: PlayableKind::Channel
                },
                PlaybackEvent::EntitlementGranted {
                    session_id: "live-ch1".to_string()
                },
                PlaybackEvent::Loaded {
                    session_id: "live-ch1".to_string(),
                    start: ResolvedStart::LiveEdge
                },
                PlaybackEvent::Play,
            ]
        );

        let locator = "https://cdn.test/ch1/live.isml/manifest.mpd".to_string();
        let instructions = f.tech.instructions();
        assert!(matches!(
            &instructions[0],
            TechInstruction::Init(setup) if setup.start == ResolvedStart::LiveEdge
        ));
        assert_eq!(
            instructions[1..3],
            [
                TechInstruction::Load {
                    media_id: "ch1".to_string(),
                    locator: locator.clone(),
                    is_offline: false
                },
                TechInstruction::Play(locator),
            ]
        );

        let info = f.player.session_info().await.unwrap().unwrap();
        assert!(info.revalidating);
        assert!(info.is_playing);

        wait_for_event(&mut f.events, program_changed_to("evening"))
            .await
            .unwrap();
        assert_eq!(
            f.player.current_program().await.unwrap(),
            Some(evening())
        );

        f.mocks.clock.set(at(20, 45));
        wait_for_event(&mut f.events, program_changed_to("late"))
            .await
            .unwrap();
        assert_eq!(f.player.current_program().await.unwrap(), Some(late()));
        assert!(
            f.mocks
                .gateway
                .calls()
                .contains(&GatewayCall::Catchup("ch1".to_string(), "late".to_string()))
        );
    }

    #[tokio::test]
    async fn test_past_program_starts_at_its_beginning() {
        let mut f = fixture();
        let program = afternoon();

        play(
            &f,
            Playable::Program(program.clone()),
            PlaybackProperties::default(),
        )
        .await;

        let event = wait_for_event(&mut f.events, is_loaded).await.unwrap();
        assert_eq!(
            event,
            PlaybackEvent::Loaded {
                session_id: "catchup-afternoon".to_string(),
                start: ResolvedStart::Beginning(ms(at(14, 0)))
            }
        );
        assert_eq!(f.mocks.metadata.details_calls(), 0);
        assert_eq!(
            f.mocks.gateway.calls(),
            vec![GatewayCall::Catchup(
                "ch1".to_string(),
                "afternoon".to_string()
            )]
        );
        assert_eq!(f.player.current_program().await.unwrap(), Some(program));
    }

    #[tokio::test]
    async fn test_live_program_starts_at_live_edge() {
        let mut f = fixture();
        f.mocks.metadata.add_program(evening());

        play(
            &f,
            Playable::Program(evening()),
            PlaybackProperties::default(),
        )
        .await;

        let event = wait_for_event(&mut f.events, is_loaded).await.unwrap();
        assert!(matches!(
            event,
            PlaybackEvent::Loaded {
                start: ResolvedStart::LiveEdge,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_underspecified_program_is_looked_up_once() {
        let mut f = fixture();
        f.mocks.metadata.add_program(afternoon());

        play(
            &f,
            Playable::Program(Program::new("ch1", "afternoon")),
            PlaybackProperties::default(),
        )
        .await;

        let event = wait_for_event(&mut f.events, is_loaded).await.unwrap();
        assert!(matches!(
            event,
            PlaybackEvent::Loaded {
                start: ResolvedStart::Beginning(start),
                ..
            } if start == ms(at(14, 0))
        ));
        assert_eq!(f.mocks.metadata.details_calls(), 1);
        assert_eq!(
            f.player.current_program().await.unwrap(),
            Some(afternoon())
        );
    }

    #[tokio::test]
    async fn test_failed_program_lookup_degrades_to_tech_default() {
        let mut f = fixture();
        f.mocks.metadata.fail_with(Some(MetadataError::Unavailable {
            reason: "epg down".to_string(),
        }));

        play(
            &f,
            Playable::Program(Program::new("ch1", "afternoon")),
            PlaybackProperties::default(),
        )
        .await;

        let events = events_until(&mut f.events, is_play).await.unwrap();
        let names: Vec<_> = events.iter().map(PlaybackEvent::name).collect();
        assert_eq!(
            names,
            vec![
                "init",
                "entitlement-load-start",
                "entitlement-granted",
                "start-degraded",
                "loaded",
                "play"
            ]
        );
        assert!(matches!(
            &events[4],
            PlaybackEvent::Loaded { start, .. } if start.is_degraded()
        ));
        assert_eq!(f.tech.load_count(), 1);
    }

    #[tokio::test]
    async fn test_channel_bookmark_without_bookmark_joins_live_edge() {
        let mut f = fixture();

        play(
            &f,
            Playable::channel("ch1"),
            PlaybackProperties::default().with_start_policy(StartPolicy::Bookmark),
        )
        .await;

        let event = wait_for_event(&mut f.events, is_loaded).await.unwrap();
        assert!(matches!(
            event,
            PlaybackEvent::Loaded {
                start: ResolvedStart::LiveEdge,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_channel_bookmark_on_live_stream_resumes_at_live_edge_time() {
        let mut f = fixture();
        let live_edge = ms(at(19, 50));
        f.mocks.gateway.set_grant(
            "ch1",
            Grant::new(
                "live-ch1",
                "https://cdn.test/ch1/live.isml/manifest.mpd",
                "play-token",
            )
            .with_channel("ch1")
            .with_bookmark(600_000, ms(at(19, 0)))
            .with_live_edge(live_edge),
        );

        play(
            &f,
            Playable::channel("ch1"),
            PlaybackProperties::default().with_start_policy(StartPolicy::Bookmark),
        )
        .await;

        let event = wait_for_event(&mut f.events, is_loaded).await.unwrap();
        assert_eq!(
            event,
            PlaybackEvent::Loaded {
                session_id: "live-ch1".to_string(),
                start: ResolvedStart::Bookmark(live_edge)
            }
        );
    }

    #[tokio::test]
    async fn test_refused_entitlement_reports_error_without_loading() {
        let mut f = fixture();
        f.mocks.gateway.deny("ch1", "NOT_ENTITLED");

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;

        let events = events_until(&mut f.events, is_error).await.unwrap();
        assert_eq!(
            events,
            vec![
                PlaybackEvent::Init,
                PlaybackEvent::EntitlementLoadStart {
                    kind: PlayableKind::Channel
                },
                PlaybackEvent::Error(PlaybackError::EntitlementFailed {
                    code: "NOT_ENTITLED".to_string(),
                    message: "ch1 not entitled".to_string()
                }),
            ]
        );
        assert_eq!(f.tech.load_count(), 0);
        assert_eq!(f.player.session_info().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_playable_leaves_session_untouched() {
        let mut f = fixture();

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();

        play(&f, Playable::channel(""), PlaybackProperties::default()).await;
        let event = f.events.recv().await.unwrap();
        assert!(matches!(
            event,
            PlaybackEvent::Error(PlaybackError::InvalidPlayable { .. })
        ));

        let info = f.player.session_info().await.unwrap().unwrap();
        assert_eq!(info.playable, Playable::channel("ch1"));
        assert!(info.revalidating);
        assert_eq!(
            f.mocks.gateway.calls(),
            vec![GatewayCall::Live("ch1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_forward_seek_blocked_when_fast_forward_disabled() {
        let mut f = fixture();
        f.mocks.gateway.set_grant(
            "a1",
            Grant::new("vod-a1", "https://cdn.test/vod/a1/manifest.mpd", "t")
                .with_asset("a1")
                .with_trick_play(false, true, true),
        );

        play(&f, Playable::asset("a1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();
        f.tech.set_playhead_position(Some(10_000));

        f.player.seek_to(20_000).await.unwrap();
        f.player.seek_to(5_000).await.unwrap();
        assert!(!f.player.can_seek_forward().await.unwrap());

        let seeks: Vec<_> = f
            .tech
            .instructions()
            .into_iter()
            .filter(|instruction| matches!(instruction, TechInstruction::SeekTo(_)))
            .collect();
        assert_eq!(seeks, vec![TechInstruction::SeekTo(5_000)]);
    }

    #[tokio::test]
    async fn test_backward_seek_blocked_when_rewind_disabled() {
        let mut f = fixture();
        f.mocks.gateway.set_grant(
            "a1",
            Grant::new("vod-a1", "https://cdn.test/vod/a1/manifest.mpd", "t")
                .with_asset("a1")
                .with_trick_play(true, false, true),
        );

        play(&f, Playable::asset("a1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();
        f.tech.set_playhead_position(Some(10_000));

        f.player.seek_to(5_000).await.unwrap();
        f.player.seek_to(20_000).await.unwrap();
        assert!(!f.player.can_seek_back().await.unwrap());

        let seeks: Vec<_> = f
            .tech
            .instructions()
            .into_iter()
            .filter(|instruction| matches!(instruction, TechInstruction::SeekTo(_)))
            .collect();
        assert_eq!(seeks, vec![TechInstruction::SeekTo(20_000)]);
    }

    #[tokio::test]
    async fn test_seek_without_playhead_needs_both_directions() {
        let mut f = fixture();
        f.mocks.gateway.set_grant(
            "a1",
            Grant::new("vod-a1", "https://cdn.test/vod/a1/manifest.mpd", "t")
                .with_asset("a1")
                .with_trick_play(false, true, true),
        );

        play(&f, Playable::asset("a1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();

        f.player.seek_to(5_000).await.unwrap();
        f.player.session_info().await.unwrap();

        assert!(
            !f.tech
                .instructions()
                .iter()
                .any(|instruction| matches!(instruction, TechInstruction::SeekTo(_)))
        );
    }

    #[tokio::test]
    async fn test_trick_play_follows_current_grant() {
        let mut f = fixture();
        f.mocks.gateway.set_grant(
            "a1",
            Grant::new("vod-a1", "https://cdn.test/vod/a1/manifest.mpd", "t")
                .with_asset("a1")
                .with_trick_play(false, false, false),
        );

        assert!(f.player.can_seek_forward().await.unwrap());

        play(&f, Playable::asset("a1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_loaded).await.unwrap();
        let guard = f.player.trick_play().await.unwrap();
        assert!(!guard.can_seek_forward());
        assert!(!guard.can_seek_back());
        assert!(!guard.can_pause());

        play(&f, Playable::asset("a2"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_loaded).await.unwrap();
        assert!(f.player.can_seek_forward().await.unwrap());
        assert!(f.player.can_pause().await.unwrap());
    }

    #[tokio::test]
    async fn test_new_play_cancels_previous_revalidation() {
        let mut f = fixture();
        f.mocks.metadata.add_program(evening());
        f.mocks.metadata.add_program(late());
        f.mocks
            .metadata
            .add_program(Program::new("ch2", "movie").with_schedule(at(19, 0), at(22, 0)));

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        wait_for_event(&mut f.events, program_changed_to("evening"))
            .await
            .unwrap();

        f.mocks.gateway.set_latency("ch2", Duration::from_millis(100));
        play(&f, Playable::channel("ch2"), PlaybackProperties::default()).await;
        // The play command is processed before this query is answered.
        f.player.session_info().await.unwrap();
        f.mocks.clock.set(at(20, 45));

        let mut events = events_until(&mut f.events, is_play).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        events.extend(f.events.drain());

        assert!(!events.iter().any(|event| matches!(
            event,
            PlaybackEvent::ProgramChanged(program) if program.channel_id == "ch1"
        )));
        assert!(
            !f.mocks
                .gateway
                .calls()
                .contains(&GatewayCall::Catchup("ch1".to_string(), "late".to_string()))
        );
        let info = f.player.session_info().await.unwrap().unwrap();
        assert_eq!(info.playable, Playable::channel("ch2"));
    }

    #[tokio::test]
    async fn test_superseded_grant_is_discarded() {
        let mut f = fixture();
        f.mocks.gateway.set_latency("a1", Duration::from_millis(100));

        play(&f, Playable::asset("a1"), PlaybackProperties::default()).await;
        play(&f, Playable::asset("a2"), PlaybackProperties::default()).await;

        let event = wait_for_event(&mut f.events, is_loaded).await.unwrap();
        assert!(matches!(
            event,
            PlaybackEvent::Loaded { session_id, .. } if session_id == "vod-a2"
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!f.events.drain().iter().any(is_loaded));
        assert_eq!(f.tech.load_count(), 1);
        let info = f.player.session_info().await.unwrap().unwrap();
        assert_eq!(info.playable, Playable::asset("a2"));
    }

    #[tokio::test]
    async fn test_seek_to_time_inside_window_seeks_tech() {
        let mut f = fixture();

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();
        f.tech.set_seekable_range(Some((ms(at(19, 0)), ms(at(20, 0)))));

        f.player.seek_to_time(ms(at(19, 40))).await.unwrap();
        f.player.session_info().await.unwrap();

        assert!(
            f.tech
                .instructions()
                .contains(&TechInstruction::SeekToTime(ms(at(19, 40))))
        );
    }

    #[tokio::test]
    async fn test_seek_to_time_outside_window_plays_covering_program() {
        let mut f = fixture();
        f.mocks.metadata.add_program(evening());
        f.mocks.metadata.add_program(afternoon());

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        wait_for_event(&mut f.events, program_changed_to("evening"))
            .await
            .unwrap();
        f.tech.set_seekable_range(Some((ms(at(19, 0)), ms(at(20, 0)))));

        let target = ms(at(15, 0));
        f.player.seek_to_time(target).await.unwrap();

        let events = events_until(&mut f.events, is_play).await.unwrap();
        assert_eq!(
            events,
            vec![
                PlaybackEvent::Init,
                PlaybackEvent::EntitlementLoadStart {
                    kind: PlayableKind::Program
                },
                PlaybackEvent::EntitlementGranted {
                    session_id: "catchup-afternoon".to_string()
                },
                PlaybackEvent::Loaded {
                    session_id: "catchup-afternoon".to_string(),
                    start: ResolvedStart::ExplicitTime(target)
                },
                PlaybackEvent::Play,
            ]
        );
        let info = f.player.session_info().await.unwrap().unwrap();
        assert_eq!(info.playable, Playable::Program(afternoon()));
    }

    #[tokio::test]
    async fn test_seek_to_time_reentry_keeps_playing() {
        let mut f = fixture();
        f.mocks.metadata.add_program(afternoon());

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();

        f.player.seek_to_time(ms(at(15, 0))).await.unwrap();
        let events = events_until(&mut f.events, is_play).await.unwrap();
        assert!(events.iter().any(is_loaded));
        assert!(f.tech.last_setup().unwrap().autoplay);
    }

    #[tokio::test]
    async fn test_paused_seek_to_time_reenters_without_autoplay() {
        let mut f = fixture();
        f.mocks.metadata.add_program(afternoon());

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();
        f.player.pause().await.unwrap();
        wait_for_event(&mut f.events, |event| matches!(event, PlaybackEvent::Pause))
            .await
            .unwrap();

        let target = ms(at(15, 0));
        f.player.seek_to_time(target).await.unwrap();

        let events = events_until(&mut f.events, is_loaded).await.unwrap();
        assert!(events.contains(&PlaybackEvent::Loaded {
            session_id: "catchup-afternoon".to_string(),
            start: ResolvedStart::ExplicitTime(target)
        }));
        assert!(!f.tech.last_setup().unwrap().autoplay);

        let info = f.player.session_info().await.unwrap().unwrap();
        assert_eq!(info.playable, Playable::Program(afternoon()));
        assert!(!info.is_playing);
        assert!(!f.events.drain().iter().any(is_play));
    }

    #[tokio::test]
    async fn test_paused_seek_ignores_direction_rights() {
        let mut f = fixture();
        f.mocks.gateway.set_grant(
            "ch1",
            Grant::new("live-ch1", "https://cdn.test/ch1/live.isml/manifest.mpd", "t")
                .with_channel("ch1")
                .with_trick_play(true, false, true),
        );

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();
        f.tech.set_playhead_time(Some(ms(at(19, 50))));
        f.tech.set_seekable_range(Some((ms(at(19, 0)), ms(at(20, 0)))));
        f.player.pause().await.unwrap();

        f.player.seek_to_time(ms(at(19, 10))).await.unwrap();
        f.player.session_info().await.unwrap();

        assert!(
            f.tech
                .instructions()
                .contains(&TechInstruction::SeekToTime(ms(at(19, 10))))
        );
    }

    #[tokio::test]
    async fn test_seek_to_time_without_program_reports_not_found() {
        let mut f = fixture();

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();
        f.tech.clear_instructions();

        let target = ms(at(3, 0));
        f.player.seek_to_time(target).await.unwrap();

        let event = wait_for_event(&mut f.events, is_error).await.unwrap();
        assert_eq!(
            event,
            PlaybackEvent::Error(PlaybackError::ProgramNotFound {
                channel_id: "ch1".to_string(),
                unix_ms: target
            })
        );
        assert!(f.tech.instructions().is_empty());
        assert!(f.player.session_info().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_seek_to_time_lookup_failure_stops_session() {
        let mut f = fixture();

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();
        f.mocks.metadata.fail_with(Some(MetadataError::Unavailable {
            reason: "epg down".to_string(),
        }));

        f.player.seek_to_time(ms(at(3, 0))).await.unwrap();

        let events = events_until(&mut f.events, |event| matches!(event, PlaybackEvent::Stop))
            .await
            .unwrap();
        assert!(events.iter().any(|event| matches!(
            event,
            PlaybackEvent::Error(PlaybackError::GenericPlaybackFailure { .. })
        )));
        assert_eq!(f.player.session_info().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_timeshift_applied_once_entitled() {
        let mut f = fixture();
        f.mocks.metadata.add_program(evening());

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        wait_for_event(&mut f.events, program_changed_to("evening"))
            .await
            .unwrap();

        f.player
            .set_timeshift_delay(Duration::from_secs(600))
            .await
            .unwrap();

        let tech = f.tech.clone();
        assert!(
            eventually(|| tech
                .instructions()
                .contains(&TechInstruction::SetTimeshiftDelay(600_000)))
            .await
        );
    }

    #[tokio::test]
    async fn test_timeshift_into_unentitled_program_stops() {
        let mut f = fixture();
        f.mocks.metadata.add_program(early());
        f.mocks.metadata.add_program(evening());
        f.mocks.gateway.deny("early", "BLACKOUT");

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        wait_for_event(&mut f.events, program_changed_to("evening"))
            .await
            .unwrap();

        f.player
            .set_timeshift_delay(Duration::from_secs(45 * 60))
            .await
            .unwrap();

        let events = events_until(&mut f.events, |event| matches!(event, PlaybackEvent::Stop))
            .await
            .unwrap();
        assert!(events.iter().any(|event| matches!(
            event,
            PlaybackEvent::Error(PlaybackError::EntitlementFailed { code, .. }) if code == "BLACKOUT"
        )));
        assert!(
            !f.tech
                .instructions()
                .iter()
                .any(|instruction| matches!(instruction, TechInstruction::SetTimeshiftDelay(_)))
        );
    }

    #[tokio::test]
    async fn test_out_of_range_timeshift_is_rejected() {
        let mut f = fixture();
        f.mocks.metadata.add_program(evening());

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();

        f.player
            .set_timeshift_delay(Duration::from_secs(u64::MAX))
            .await
            .unwrap();

        let event = wait_for_event(&mut f.events, is_error).await.unwrap();
        assert!(matches!(
            event,
            PlaybackEvent::Error(PlaybackError::GenericPlaybackFailure { .. })
        ));
        let info = f.player.session_info().await.unwrap().unwrap();
        assert!(info.is_playing);
        assert!(
            !f.tech
                .instructions()
                .iter()
                .any(|instruction| matches!(instruction, TechInstruction::SetTimeshiftDelay(_)))
        );
    }

    #[tokio::test]
    async fn test_timeshift_ignored_for_assets() {
        let mut f = fixture();

        play(&f, Playable::asset("a1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();

        f.player
            .set_timeshift_delay(Duration::from_secs(60))
            .await
            .unwrap();
        f.player.session_info().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(f.events.drain().is_empty());
        assert_eq!(f.mocks.metadata.epg_calls(), 0);
    }

    #[tokio::test]
    async fn test_lost_entitlement_at_boundary_stops_session() {
        let mut f = fixture();
        f.mocks.metadata.add_program(evening());
        f.mocks.metadata.add_program(late());
        f.mocks.gateway.deny("late", "NOT_ENTITLED");

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        wait_for_event(&mut f.events, program_changed_to("evening"))
            .await
            .unwrap();

        f.mocks.clock.set(at(20, 45));
        let events = events_until(&mut f.events, |event| matches!(event, PlaybackEvent::Stop))
            .await
            .unwrap();

        assert!(events.iter().any(|event| matches!(
            event,
            PlaybackEvent::Error(PlaybackError::EntitlementFailed { .. })
        )));
        assert_eq!(f.player.session_info().await.unwrap(), None);
        assert!(f.tech.instructions().contains(&TechInstruction::Stop));
    }

    #[tokio::test]
    async fn test_offline_asset_plays_from_stored_grant() {
        let mut f = fixture();
        let manifest = "/media/downloads/7f3c/manifest.mpd";
        f.mocks.grant_store.insert(
            manifest,
            Grant::new("origin", "https://cdn.test/vod/a1/manifest.mpd", "t")
                .with_asset("a1")
                .with_bookmark(42_000, ms(at(12, 0))),
        );

        play(
            &f,
            Playable::offline(manifest),
            PlaybackProperties::default().with_start_policy(StartPolicy::Bookmark),
        )
        .await;

        let events = events_until(&mut f.events, is_play).await.unwrap();
        let Some(PlaybackEvent::Loaded { session_id, start }) =
            events.iter().find(|event| is_loaded(event))
        else {
            panic!("no loaded event in {events:?}");
        };
        assert!(session_id.starts_with("offline-"));
        assert_eq!(*start, ResolvedStart::Bookmark(42_000));
        assert!(f.mocks.gateway.calls().is_empty());
        assert!(f.tech.instructions().contains(&TechInstruction::Load {
            media_id: "a1".to_string(),
            locator: manifest.to_string(),
            is_offline: true,
        }));

        let info = f.player.session_info().await.unwrap().unwrap();
        assert!(!info.revalidating);
        assert_eq!(
            f.player.session_id().await.unwrap().as_deref(),
            Some(session_id.as_str())
        );
    }

    #[tokio::test]
    async fn test_offline_grant_without_asset_id_loads_under_directory_name() {
        let mut f = fixture();
        let manifest = "/media/sintel/manifest.mpd";
        f.mocks.grant_store.insert(
            manifest,
            Grant::new("origin", "https://cdn.test/vod/sintel/manifest.mpd", "t"),
        );

        play(&f, Playable::offline(manifest), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();

        assert!(f.tech.instructions().contains(&TechInstruction::Load {
            media_id: "sintel".to_string(),
            locator: manifest.to_string(),
            is_offline: true,
        }));
    }

    #[tokio::test]
    async fn test_offline_asset_without_grant_fails() {
        let mut f = fixture();

        play(
            &f,
            Playable::offline("/media/missing/manifest.mpd"),
            PlaybackProperties::default(),
        )
        .await;

        let event = wait_for_event(&mut f.events, is_error).await.unwrap();
        assert!(matches!(
            event,
            PlaybackEvent::Error(PlaybackError::GenericPlaybackFailure { .. })
        ));
        assert_eq!(f.tech.load_count(), 0);
    }

    #[tokio::test]
    async fn test_pause_requires_timeshift_permission() {
        let mut f = fixture();
        f.mocks.gateway.set_grant(
            "a1",
            Grant::new("vod-a1", "https://cdn.test/vod/a1/manifest.mpd", "t")
                .with_asset("a1")
                .with_trick_play(true, true, false),
        );

        play(&f, Playable::asset("a1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();
        f.player.pause().await.unwrap();
        assert!(f.player.session_info().await.unwrap().unwrap().is_playing);
        assert!(!f.tech.instructions().contains(&TechInstruction::Pause));

        play(&f, Playable::asset("a2"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();
        f.player.pause().await.unwrap();
        f.player.resume().await.unwrap();

        let events = events_until(&mut f.events, |event| matches!(event, PlaybackEvent::Resume))
            .await
            .unwrap();
        assert_eq!(events, vec![PlaybackEvent::Pause, PlaybackEvent::Resume]);
    }

    #[tokio::test]
    async fn test_no_autoplay_loads_without_playing() {
        let mut f = fixture();

        play(
            &f,
            Playable::asset("a1"),
            PlaybackProperties::default().with_autoplay(false),
        )
        .await;
        wait_for_event(&mut f.events, is_loaded).await.unwrap();

        let info = f.player.session_info().await.unwrap().unwrap();
        assert!(!info.is_playing);
        assert!(
            !f.tech
                .instructions()
                .iter()
                .any(|instruction| matches!(instruction, TechInstruction::Play(_)))
        );
        assert!(!f.tech.last_setup().unwrap().autoplay);

        f.player.resume().await.unwrap();
        assert_eq!(f.events.recv().await, Some(PlaybackEvent::Resume));
    }

    #[tokio::test]
    async fn test_grant_drm_reaches_tech() {
        let mut f = fixture();
        f.mocks.gateway.set_grant(
            "a1",
            Grant::new("vod-a1", "https://cdn.test/vod/a1/manifest.mpd", "t")
                .with_asset("a1")
                .with_drm("https://license.test/widevine", Some("cHNzaA==".to_string())),
        );

        play(&f, Playable::asset("a1"), PlaybackProperties::default()).await;
        wait_for_event(&mut f.events, is_loaded).await.unwrap();

        let drm = f.tech.last_setup().unwrap().drm.unwrap();
        assert_eq!(drm.license_server_url, "https://license.test/widevine");
        assert_eq!(drm.init_data_base64.as_deref(), Some("cHNzaA=="));
    }

    #[tokio::test]
    async fn test_stop_ends_session() {
        let mut f = fixture();

        play(&f, Playable::channel("ch1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();

        f.player.stop().await.unwrap();
        wait_for_event(&mut f.events, |event| matches!(event, PlaybackEvent::Stop))
            .await
            .unwrap();

        assert_eq!(f.player.session_info().await.unwrap(), None);
        assert_eq!(f.player.session_id().await.unwrap(), None);
        assert!(f.tech.instructions().contains(&TechInstruction::Stop));
    }

    #[tokio::test]
    async fn test_dispose_releases_tech_and_shuts_down() {
        let mut f = fixture();

        play(&f, Playable::asset("a1"), PlaybackProperties::default()).await;
        events_until(&mut f.events, is_play).await.unwrap();

        f.player.dispose().await.unwrap();

        assert_eq!(f.events.recv().await, Some(PlaybackEvent::Dispose));
        assert_eq!(f.events.recv().await, None);
        let instructions = f.tech.instructions();
        assert_eq!(
            instructions[instructions.len() - 2..],
            [TechInstruction::Stop, TechInstruction::Release]
        );

        assert!(!f.player.is_running());
        assert_eq!(
            f.player.session_info().await,
            Err(PlaybackError::OrchestratorShutdown)
        );
        assert_eq!(
            f.player
                .play(Playable::asset("a2"), PlaybackProperties::default())
                .await,
            Err(PlaybackError::OrchestratorShutdown)
        );
    }
}
