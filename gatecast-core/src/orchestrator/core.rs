//! Playback orchestrator state machine owned by the actor.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::Collaborators;
use super::commands::SessionCompletion;
use super::revalidation::{EntitlementChecker, RevalidationHandle, RevalidationLoop};
use super::session::{EntitlementRequest, PendingPlay, Session, SessionInfo, SessionToken};
use crate::config::GatecastConfig;
use crate::errors::{EntitlementError, MetadataError, PlaybackError};
use crate::events::{EventBus, PlaybackEvent};
use crate::guard::TrickPlayGuard;
use crate::model::{Grant, Playable, PlaybackProperties, Program, StartPolicy};
use crate::policy::{self, ResolvedStart, StartResolution};
use crate::traits::{PlaybackTech, TechSetup};

/// Grant, start and program of a session about to be activated.
struct Activation {
    pending: PendingPlay,
    grant: Grant,
    session_id: String,
    start: ResolvedStart,
    program: Option<Program>,
}

/// Session lifecycle, entitlement sequencing and tech control.
///
/// Owned by a single actor task; every method runs on that task, so session
/// state needs no locking. Asynchronous work is spawned and reports back
/// through `completions`, tagged with the token of the session that started it.
pub struct PlaybackOrchestrator<T: PlaybackTech> {
    config: GatecastConfig,
    collaborators: Collaborators,
    tech: T,
    events: Arc<EventBus>,
    completions: mpsc::UnboundedSender<SessionCompletion>,
    token: SessionToken,
    pending: Option<PendingPlay>,
    session: Option<Session>,
}

impl<T: PlaybackTech> PlaybackOrchestrator<T> {
    pub(crate) fn new(
        config: GatecastConfig,
        collaborators: Collaborators,
        tech: T,
        events: Arc<EventBus>,
        completions: mpsc::UnboundedSender<SessionCompletion>,
    ) -> Self {
        Self {
            config,
            collaborators,
            tech,
            events,
            completions,
            token: SessionToken::default(),
            pending: None,
            session: None,
        }
    }

    /// Starts a new session for `playable`, replacing the current one.
    ///
    /// An invalid playable is rejected before any state changes.
    pub(crate) async fn play(&mut self, playable: Playable, properties: PlaybackProperties) {
        if let Err(error) = playable.validate() {
            tracing::warn!("Rejected play request: {}", error);
            self.events.emit(PlaybackEvent::Error(error));
            return;
        }

        if let Some(previous) = self.release_session().await {
            if previous.playing {
                self.tech.stop();
            }
        }
        let token = self.token;

        tracing::info!("Play request {} for {}", token, playable);
        self.events.emit(PlaybackEvent::Init);
        self.events.emit(PlaybackEvent::EntitlementLoadStart {
            kind: playable.kind(),
        });

        let pending = PendingPlay {
            token,
            playable,
            properties,
            grant: None,
        };

        match EntitlementRequest::for_playable(&pending.playable) {
            Some(request) => {
                self.spawn_entitlement(token, request);
                self.pending = Some(pending);
            }
            None => self.play_offline(pending),
        }
    }

    fn spawn_entitlement(&self, token: SessionToken, request: EntitlementRequest) {
        let gateway = Arc::clone(&self.collaborators.gateway);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = request.dispatch(gateway.as_ref()).await;
            let _ = completions.send(SessionCompletion::EntitlementResolved { token, result });
        });
    }

    fn play_offline(&mut self, pending: PendingPlay) {
        let Playable::OfflineAsset { local_path } = &pending.playable else {
            return;
        };

        let grant = match self.collaborators.grant_store.load_grant(local_path) {
            Ok(grant) => grant,
            Err(e) => {
                tracing::error!("No usable grant for {}: {}", local_path.display(), e);
                self.events.emit(PlaybackEvent::Error(e.into()));
                return;
            }
        };

        let session_id = format!("offline-{}", Uuid::new_v4());
        self.accept_grant(pending, grant, session_id);
    }

    pub(crate) fn on_entitlement_resolved(&mut self, result: Result<Grant, EntitlementError>) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        match result {
            Ok(grant) => {
                let session_id = grant.session_id.clone();
                self.accept_grant(pending, grant, session_id);
            }
            Err(e) => {
                tracing::error!("Entitlement for {} refused: {}", pending.playable, e);
                self.events.emit(PlaybackEvent::Error(e.into()));
            }
        }
    }

    /// Resolves the start for a granted request, fetching program details when needed.
    fn accept_grant(&mut self, mut pending: PendingPlay, grant: Grant, session_id: String) {
        tracing::debug!("Grant {} accepted for {}", session_id, pending.playable);
        self.events.emit(PlaybackEvent::EntitlementGranted {
            session_id: session_id.clone(),
        });

        let resolution = policy::resolve(
            &pending.playable,
            pending.properties.start_policy,
            &grant,
            None,
            self.collaborators.clock.now(),
        );

        match resolution {
            StartResolution::Resolved(start) => self.activate(Activation {
                pending,
                grant,
                session_id,
                start,
                program: None,
            }),
            StartResolution::NeedsProgramDetails => {
                let Some(program) = pending.playable.program().cloned() else {
                    let start = policy::fallback_without_program_details("playable has no program");
                    self.activate_degraded(pending, grant, session_id, start);
                    return;
                };
                self.spawn_program_details(pending.token, program);
                pending.grant = Some(grant);
                self.pending = Some(pending);
            }
        }
    }

    fn spawn_program_details(&self, token: SessionToken, program: Program) {
        tracing::debug!("Looking up schedule of program {}", program);
        let metadata = Arc::clone(&self.collaborators.metadata);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = metadata
                .program_details(&program.channel_id, &program.program_id)
                .await;
            let _ = completions.send(SessionCompletion::ProgramDetailsResolved { token, result });
        });
    }

    pub(crate) fn on_program_details(&mut self, result: Result<Program, MetadataError>) {
        let Some(mut pending) = self.pending.take() else {
            return;
        };
        let Some(grant) = pending.grant.take() else {
            return;
        };
        let session_id = grant.session_id.clone();

        let details = match result {
            Ok(details) => details,
            Err(e) => {
                tracing::warn!("Program details for {} unavailable: {}", pending.playable, e);
                let start = policy::fallback_without_program_details(e.to_string());
                self.activate_degraded(pending, grant, session_id, start);
                return;
            }
        };

        let resolution = policy::resolve(
            &pending.playable,
            pending.properties.start_policy,
            &grant,
            Some(&details),
            self.collaborators.clock.now(),
        );

        match resolution {
            StartResolution::Resolved(start) => self.activate(Activation {
                pending,
                grant,
                session_id,
                start,
                program: Some(details),
            }),
            StartResolution::NeedsProgramDetails => {
                let start =
                    policy::fallback_without_program_details("program details carry no schedule");
                self.activate_degraded(pending, grant, session_id, start);
            }
        }
    }

    fn activate_degraded(
        &mut self,
        pending: PendingPlay,
        grant: Grant,
        session_id: String,
        start: ResolvedStart,
    ) {
        if let ResolvedStart::TechDefault { fallback } = &start {
            tracing::warn!("Starting {} at tech default: {}", pending.playable, fallback);
            self.events.emit(PlaybackEvent::StartDegraded {
                fallback: fallback.clone(),
            });
        }
        self.activate(Activation {
            pending,
            grant,
            session_id,
            start,
            program: None,
        });
    }

    /// Hands the granted session to the tech and makes it the active session.
    fn activate(&mut self, activation: Activation) {
        let Activation {
            pending,
            grant,
            session_id,
            start,
            program,
        } = activation;
        let PendingPlay {
            token,
            playable,
            properties,
            ..
        } = pending;

        let is_offline = matches!(playable, Playable::OfflineAsset { .. });
        let locator = match &playable {
            Playable::OfflineAsset { local_path } => local_path.display().to_string(),
            _ => grant.media_locator.clone(),
        };

        let setup = TechSetup {
            session_id: session_id.clone(),
            play_token: grant.play_token.clone(),
            start: start.clone(),
            autoplay: properties.autoplay,
            native_controls: properties.native_controls,
            drm: grant.drm_properties().or_else(|| properties.drm.clone()),
        };
        self.tech.init(&setup);
        self.tech.load(&media_id(&playable, &grant), &locator, is_offline);

        tracing::info!("Session {} loaded {} starting at {:?}", session_id, playable, start);
        self.events.emit(PlaybackEvent::Loaded {
            session_id: session_id.clone(),
            start: start.clone(),
        });

        let playing = properties.autoplay;
        if playing {
            self.tech.play(&locator);
            self.events.emit(PlaybackEvent::Play);
        }

        let current_program = program.or_else(|| playable.program().cloned());
        let revalidation = match playable.channel_id() {
            Some(channel_id) if playable.needs_revalidation() => Some(self.spawn_revalidation(
                token,
                channel_id.to_string(),
                current_program.clone(),
            )),
            _ => None,
        };

        self.session = Some(Session {
            token,
            playable,
            properties,
            session_id,
            grant,
            resolved_start: start,
            playing,
            current_program,
            timeshift_delay_ms: 0,
            revalidation,
        });
    }

    fn checker(&self) -> EntitlementChecker {
        EntitlementChecker::new(
            Arc::clone(&self.collaborators.gateway),
            Arc::clone(&self.collaborators.metadata),
            self.config.revalidation.epg_window,
        )
    }

    fn spawn_revalidation(
        &self,
        token: SessionToken,
        channel_id: String,
        current: Option<Program>,
    ) -> RevalidationHandle {
        RevalidationLoop::new(
            token,
            channel_id,
            current,
            self.checker(),
            self.config.revalidation.tick_interval,
            self.completions.clone(),
        )
        .spawn()
    }

    /// Drops the pending request and the active session, cancelling its
    /// revalidation loop, and invalidates every outstanding completion.
    ///
    /// The tech is left untouched; the caller decides whether to stop it.
    async fn release_session(&mut self) -> Option<Session> {
        self.pending = None;
        self.token = self.token.next();

        let mut session = self.session.take()?;
        if let Some(revalidation) = session.revalidation.take() {
            revalidation.cancel().await;
        }
        tracing::debug!("Released session {}", session.session_id);
        Some(session)
    }

    pub(crate) async fn stop(&mut self) {
        self.release_session().await;
        self.tech.stop();
        self.events.emit(PlaybackEvent::Stop);
    }

    pub(crate) fn pause(&mut self) {
        let guard = self.trick_play();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.playing {
            return;
        }
        if !guard.can_pause() {
            tracing::debug!(
                "Pause ignored: session {} does not allow timeshift",
                session.session_id
            );
            return;
        }

        self.tech.pause();
        session.playing = false;
        self.events.emit(PlaybackEvent::Pause);
    }

    pub(crate) fn resume(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.playing {
            return;
        }

        self.tech.resume();
        session.playing = true;
        self.events.emit(PlaybackEvent::Resume);
    }

    pub(crate) fn seek_to(&mut self, position_ms: i64) {
        let guard = self.trick_play();
        let Some(session) = &self.session else {
            return;
        };
        if !session.playing {
            tracing::debug!("Seek ignored: session {} is not playing", session.session_id);
            return;
        }

        let playhead = self.tech.playhead_position_ms();
        if !guard.permits_seek(playhead, position_ms) {
            tracing::debug!(
                "Seek from {:?}ms to {}ms not allowed by grant",
                playhead,
                position_ms
            );
            return;
        }
        self.tech.seek_to(position_ms);
    }

    pub(crate) fn seek_to_time(&mut self, unix_ms: i64) {
        let guard = self.trick_play();
        let Some(session) = &self.session else {
            return;
        };
        // Direction rights only apply to a moving playhead.
        if session.playing {
            let playhead = self.tech.playhead_time_ms();
            if !guard.permits_seek(playhead, unix_ms) {
                tracing::debug!(
                    "Seek from {:?} to {} not allowed by grant",
                    playhead,
                    unix_ms
                );
                return;
            }
        }

        let within_window = self
            .tech
            .seekable_time_range()
            .is_some_and(|(start, end)| (start..=end).contains(&unix_ms));
        if within_window {
            self.tech.seek_to_time(unix_ms);
            return;
        }

        let (Some(channel_id), Some(at)) = (
            session.channel_id(),
            DateTime::<Utc>::from_timestamp_millis(unix_ms),
        ) else {
            tracing::debug!("Seek to {} outside seekable range ignored", unix_ms);
            return;
        };

        tracing::debug!(
            "Seek to {} outside seekable range, looking up program on {}",
            unix_ms,
            channel_id
        );
        let token = self.token;
        let resume_playing = session.playing;
        let window = self.config.revalidation.epg_window;
        let metadata = Arc::clone(&self.collaborators.metadata);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = metadata.epg_at(&channel_id, at, window).await;
            let _ = completions.send(SessionCompletion::SeekProgramResolved {
                token,
                channel_id,
                unix_ms,
                resume_playing,
                result,
            });
        });
    }

    pub(crate) async fn on_seek_program_resolved(
        &mut self,
        channel_id: String,
        unix_ms: i64,
        resume_playing: bool,
        result: Result<Vec<Program>, MetadataError>,
    ) {
        let programs = match result {
            Ok(programs) => programs,
            Err(e) => {
                tracing::error!("Program lookup for seek on {} failed: {}", channel_id, e);
                self.events.emit(PlaybackEvent::Error(e.into()));
                self.stop().await;
                return;
            }
        };

        let target = DateTime::<Utc>::from_timestamp_millis(unix_ms);
        let program = programs
            .iter()
            .find(|program| target.is_some_and(|at| program.covers(at)))
            .or_else(|| programs.first())
            .cloned();
        let Some(program) = program else {
            tracing::warn!("No program on {} at {}", channel_id, unix_ms);
            self.events
                .emit(PlaybackEvent::Error(PlaybackError::ProgramNotFound {
                    channel_id,
                    unix_ms,
                }));
            return;
        };

        let properties = self
            .session
            .as_ref()
            .map(|session| session.properties.clone())
            .unwrap_or_default()
            .with_start_policy(StartPolicy::ExplicitTime(unix_ms))
            .with_autoplay(resume_playing);

        tracing::info!("Seek to {} switches to program {}", unix_ms, program);
        self.play(Playable::Program(program), properties).await;
    }

    pub(crate) fn set_timeshift_delay(&mut self, delay_ms: i64) {
        let Some(session) = &self.session else {
            return;
        };
        if session.revalidation.is_none() {
            tracing::debug!(
                "Timeshift ignored: session {} is not on a channel",
                session.session_id
            );
            return;
        }
        let Some(channel_id) = session.channel_id() else {
            return;
        };

        let Some(target) = chrono::Duration::try_milliseconds(delay_ms)
            .and_then(|delay| self.collaborators.clock.now().checked_sub_signed(delay))
        else {
            tracing::warn!("Timeshift of {}ms is out of range", delay_ms);
            self.events
                .emit(PlaybackEvent::Error(PlaybackError::GenericPlaybackFailure {
                    message: format!("Timeshift delay of {delay_ms}ms is out of range"),
                }));
            return;
        };
        let token = self.token;
        let checker = self.checker();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = checker
                .check_at(&channel_id, target)
                .await
                .map(|(program, _grant)| program);
            let _ = completions.send(SessionCompletion::TimeshiftChecked {
                token,
                delay_ms,
                result,
            });
        });
    }

    pub(crate) async fn on_timeshift_checked(
        &mut self,
        delay_ms: i64,
        result: Result<Program, PlaybackError>,
    ) {
        match result {
            Ok(program) => {
                tracing::debug!("Timeshift of {}ms lands in program {}", delay_ms, program);
                if let Some(session) = self.session.as_mut() {
                    session.timeshift_delay_ms = delay_ms;
                }
                self.tech.set_timeshift_delay(delay_ms);
            }
            Err(error) => {
                tracing::error!("Timeshift of {}ms refused: {}", delay_ms, error);
                self.events.emit(PlaybackEvent::Error(error));
                self.stop().await;
            }
        }
    }

    pub(crate) fn on_program_boundary(&mut self, program: Program, grant: Grant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.grant = grant;
        session.current_program = Some(program.clone());
        self.events.emit(PlaybackEvent::ProgramChanged(program));
    }

    pub(crate) async fn on_revalidation_failed(&mut self, error: PlaybackError) {
        tracing::error!("Session lost its entitlement: {}", error);
        self.events.emit(PlaybackEvent::Error(error));
        self.stop().await;
    }

    /// Wall-clock time at the playhead.
    ///
    /// Live sessions fall back to the clock minus the timeshift delay when
    /// the tech cannot report a time.
    pub(crate) fn playhead_reference_ms(&self) -> Option<i64> {
        let session = self.session.as_ref()?;
        self.tech.playhead_time_ms().or_else(|| {
            session.follows_live_edge().then(|| {
                self.collaborators.clock.now().timestamp_millis() - session.timeshift_delay_ms
            })
        })
    }

    /// Routes a completion to its handler, dropping it if its session is gone.
    pub(crate) async fn handle_completion(&mut self, completion: SessionCompletion) {
        if completion.token() != self.token {
            tracing::debug!(
                "Discarding stale {} completion from session {}",
                completion.name(),
                completion.token()
            );
            return;
        }

        match completion {
            SessionCompletion::EntitlementResolved { result, .. } => {
                self.on_entitlement_resolved(result)
            }
            SessionCompletion::ProgramDetailsResolved { result, .. } => {
                self.on_program_details(result)
            }
            SessionCompletion::SeekProgramResolved {
                channel_id,
                unix_ms,
                resume_playing,
                result,
                ..
            } => {
                self.on_seek_program_resolved(channel_id, unix_ms, resume_playing, result)
                    .await
            }
            SessionCompletion::TimeshiftChecked {
                delay_ms, result, ..
            } => self.on_timeshift_checked(delay_ms, result).await,
            SessionCompletion::ProgramBoundary { program, grant, .. } => {
                self.on_program_boundary(program, grant)
            }
            SessionCompletion::RevalidationFailed { error, .. } => {
                self.on_revalidation_failed(error).await
            }
            SessionCompletion::PlayheadProbe { responder, .. } => {
                let _ = responder.send(self.playhead_reference_ms());
            }
        }
    }

    /// Trick-play permissions of the current grant.
    pub(crate) fn trick_play(&self) -> TrickPlayGuard {
        TrickPlayGuard::for_grant(self.session.as_ref().map(|session| &session.grant))
    }

    pub(crate) fn session_info(&self) -> Option<SessionInfo> {
        self.session.as_ref().map(Session::info)
    }

    pub(crate) fn current_program(&self) -> Option<Program> {
        self.session
            .as_ref()
            .and_then(|session| session.current_program.clone())
    }

    /// Tears down the session and releases the tech. The orchestrator is
    /// unusable afterwards.
    pub(crate) async fn dispose(&mut self) {
        if self.release_session().await.is_some() {
            self.tech.stop();
        }
        self.tech.release();
        self.events.emit(PlaybackEvent::Dispose);
        self.events.clear();
        tracing::info!("Playback orchestrator disposed");
    }
}

/// Identifier the tech loads the media under.
///
/// Offline media use the asset id persisted with the grant, falling back to
/// the name of the directory holding the manifest.
fn media_id(playable: &Playable, grant: &Grant) -> String {
    match playable {
        Playable::Channel { channel_id } => channel_id.clone(),
        Playable::Program(program) => program.program_id.clone(),
        Playable::Asset { asset_id } => asset_id.clone(),
        Playable::OfflineAsset { local_path } => grant.asset_id.clone().unwrap_or_else(|| {
            local_path
                .parent()
                .and_then(Path::file_name)
                .map_or_else(
                    || local_path.display().to_string(),
                    |name| name.to_string_lossy().into_owned(),
                )
        }),
    }
}
