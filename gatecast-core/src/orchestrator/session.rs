//! Session records owned by the orchestrator.

use std::fmt;

use super::revalidation::RevalidationHandle;
use crate::errors::EntitlementError;
use crate::model::{Grant, Playable, PlaybackProperties, Program};
use crate::policy::ResolvedStart;
use crate::traits::EntitlementGateway;

/// Generation counter identifying one play request.
///
/// Bumped whenever a session is replaced or stopped, so completions of work
/// started for an older session can be recognised and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionToken(u64);

impl SessionToken {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Backend request matching a playable kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntitlementRequest {
    Vod { asset_id: String },
    Catchup { channel_id: String, program_id: String },
    Live { channel_id: String },
}

impl EntitlementRequest {
    /// `None` for offline assets, which never reach the gateway.
    pub(crate) fn for_playable(playable: &Playable) -> Option<Self> {
        match playable {
            Playable::Channel { channel_id } => Some(EntitlementRequest::Live {
                channel_id: channel_id.clone(),
            }),
            Playable::Program(program) => Some(EntitlementRequest::Catchup {
                channel_id: program.channel_id.clone(),
                program_id: program.program_id.clone(),
            }),
            Playable::Asset { asset_id } => Some(EntitlementRequest::Vod {
                asset_id: asset_id.clone(),
            }),
            Playable::OfflineAsset { .. } => None,
        }
    }

    pub(crate) async fn dispatch(
        &self,
        gateway: &dyn EntitlementGateway,
    ) -> Result<Grant, EntitlementError> {
        match self {
            EntitlementRequest::Vod { asset_id } => gateway.play_vod(asset_id).await,
            EntitlementRequest::Catchup {
                channel_id,
                program_id,
            } => gateway.play_catchup(channel_id, program_id).await,
            EntitlementRequest::Live { channel_id } => gateway.play_live(channel_id).await,
        }
    }
}

/// A play request waiting for its grant or its program details.
#[derive(Debug)]
pub(crate) struct PendingPlay {
    pub token: SessionToken,
    pub playable: Playable,
    pub properties: PlaybackProperties,
    /// Set once the grant arrived and program details are being fetched.
    pub grant: Option<Grant>,
}

/// The active playback session.
pub(crate) struct Session {
    pub token: SessionToken,
    pub playable: Playable,
    pub properties: PlaybackProperties,
    pub session_id: String,
    /// Latest grant; replaced when the revalidation loop re-entitles.
    pub grant: Grant,
    pub resolved_start: ResolvedStart,
    pub playing: bool,
    pub current_program: Option<Program>,
    pub timeshift_delay_ms: i64,
    pub revalidation: Option<RevalidationHandle>,
}

impl Session {
    /// Channel used for EPG lookups, from the playable or the grant.
    pub(crate) fn channel_id(&self) -> Option<String> {
        self.playable
            .channel_id()
            .map(str::to_string)
            .or_else(|| self.grant.channel_id.clone())
    }

    /// Live sessions have a playhead that tracks wall-clock time.
    pub(crate) fn follows_live_edge(&self) -> bool {
        matches!(self.playable, Playable::Channel { .. })
            || self.resolved_start == ResolvedStart::LiveEdge
    }

    pub(crate) fn info(&self) -> SessionInfo {
        SessionInfo {
            playable: self.playable.clone(),
            session_id: self.session_id.clone(),
            resolved_start: self.resolved_start.clone(),
            is_playing: self.playing,
            revalidating: self.revalidation.is_some(),
            current_program: self.current_program.clone(),
        }
    }
}

/// Read-only snapshot of the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub playable: Playable,
    pub session_id: String,
    pub resolved_start: ResolvedStart,
    pub is_playing: bool,
    pub revalidating: bool,
    pub current_program: Option<Program>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_ordered_generations() {
        let first = SessionToken::default();
        let second = first.next();

        assert!(second > first);
        assert_ne!(first, second);
        assert_eq!(second.to_string(), "#1");
    }

    #[test]
    fn test_request_matches_playable_kind() {
        assert_eq!(
            EntitlementRequest::for_playable(&Playable::channel("ch1")),
            Some(EntitlementRequest::Live {
                channel_id: "ch1".to_string()
            })
        );
        assert_eq!(
            EntitlementRequest::for_playable(&Playable::Program(Program::new("ch1", "p1"))),
            Some(EntitlementRequest::Catchup {
                channel_id: "ch1".to_string(),
                program_id: "p1".to_string()
            })
        );
        assert_eq!(
            EntitlementRequest::for_playable(&Playable::asset("a1")),
            Some(EntitlementRequest::Vod {
                asset_id: "a1".to_string()
            })
        );
        assert_eq!(
            EntitlementRequest::for_playable(&Playable::offline("/media/a1/manifest.mpd")),
            None
        );
    }
}
