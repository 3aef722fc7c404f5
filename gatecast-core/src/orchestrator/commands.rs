//! Messages processed by the playback orchestrator actor.

use tokio::sync::oneshot;

use super::session::{SessionInfo, SessionToken};
use crate::errors::{EntitlementError, MetadataError, PlaybackError};
use crate::guard::TrickPlayGuard;
use crate::model::{Grant, Playable, PlaybackProperties, Program};

/// Requests sent by `PlayerHandle`s.
///
/// Playback controls are fire-and-forget: their outcome is reported through
/// the event bus. Queries carry a responder.
pub enum OrchestratorCommand {
    /// Start playback of a playable, replacing any current session.
    Play {
        playable: Playable,
        properties: PlaybackProperties,
    },
    Pause,
    Resume,
    Stop,
    /// Seek within the media, milliseconds from its start.
    SeekTo { position_ms: i64 },
    /// Seek to a wall-clock time, re-entitling if it lies outside the seekable window.
    SeekToTime { unix_ms: i64 },
    /// Shift a live session behind the live edge.
    SetTimeshiftDelay { delay_ms: i64 },
    GetTrickPlay {
        responder: oneshot::Sender<TrickPlayGuard>,
    },
    GetSessionInfo {
        responder: oneshot::Sender<Option<SessionInfo>>,
    },
    GetCurrentProgram {
        responder: oneshot::Sender<Option<Program>>,
    },
    /// Tear down the session, release the tech and stop the actor.
    Dispose { responder: oneshot::Sender<()> },
}

/// Completions of asynchronous work started by the orchestrator.
///
/// Each one carries the token of the session that started it. The actor
/// drops completions whose token is no longer current.
pub enum SessionCompletion {
    EntitlementResolved {
        token: SessionToken,
        result: Result<Grant, EntitlementError>,
    },
    ProgramDetailsResolved {
        token: SessionToken,
        result: Result<Program, MetadataError>,
    },
    SeekProgramResolved {
        token: SessionToken,
        channel_id: String,
        unix_ms: i64,
        resume_playing: bool,
        result: Result<Vec<Program>, MetadataError>,
    },
    TimeshiftChecked {
        token: SessionToken,
        delay_ms: i64,
        result: Result<Program, PlaybackError>,
    },
    /// The revalidation loop entered a new program and obtained a grant for it.
    ProgramBoundary {
        token: SessionToken,
        program: Program,
        grant: Grant,
    },
    /// The revalidation loop could not re-entitle the session.
    RevalidationFailed {
        token: SessionToken,
        error: PlaybackError,
    },
    /// The revalidation loop asks for the time the playhead is at.
    PlayheadProbe {
        token: SessionToken,
        responder: oneshot::Sender<Option<i64>>,
    },
}

impl SessionCompletion {
    pub fn token(&self) -> SessionToken {
        match self {
            SessionCompletion::EntitlementResolved { token, .. }
            | SessionCompletion::ProgramDetailsResolved { token, .. }
            | SessionCompletion::SeekProgramResolved { token, .. }
            | SessionCompletion::TimeshiftChecked { token, .. }
            | SessionCompletion::ProgramBoundary { token, .. }
            | SessionCompletion::RevalidationFailed { token, .. }
            | SessionCompletion::PlayheadProbe { token, .. } => *token,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionCompletion::EntitlementResolved { .. } => "entitlement",
            SessionCompletion::ProgramDetailsResolved { .. } => "program details",
            SessionCompletion::SeekProgramResolved { .. } => "seek program lookup",
            SessionCompletion::TimeshiftChecked { .. } => "timeshift check",
            SessionCompletion::ProgramBoundary { .. } => "program boundary",
            SessionCompletion::RevalidationFailed { .. } => "revalidation failure",
            SessionCompletion::PlayheadProbe { .. } => "playhead probe",
        }
    }
}
