//! Error taxonomy for playback orchestration.
//!
//! `PlaybackError` is what listeners see in `PlaybackEvent::Error`. The
//! collaborator errors (`EntitlementError`, `MetadataError`,
//! `GrantStoreError`) are what the gateway, metadata lookup and offline
//! grant store return; each converts into a `PlaybackError`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by the playback orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("Invalid playable: {reason}")]
    InvalidPlayable { reason: String },

    #[error("Entitlement failed ({code}): {message}")]
    EntitlementFailed { code: String, message: String },

    #[error("No program on channel {channel_id} at {unix_ms}")]
    ProgramNotFound { channel_id: String, unix_ms: i64 },

    #[error("Playback failed: {message}")]
    GenericPlaybackFailure { message: String },

    #[error("Playback orchestrator has shut down")]
    OrchestratorShutdown,
}

impl PlaybackError {
    /// Stable code for listeners that switch on error kind.
    pub fn code(&self) -> &str {
        match self {
            PlaybackError::InvalidPlayable { .. } => "INVALID_PLAYABLE",
            PlaybackError::EntitlementFailed { code, .. } => code,
            PlaybackError::ProgramNotFound { .. } => "PROGRAM_NOT_FOUND",
            PlaybackError::GenericPlaybackFailure { .. } => "GENERIC_PLAYBACK_FAILED",
            PlaybackError::OrchestratorShutdown => "ORCHESTRATOR_SHUTDOWN",
        }
    }

    /// Checks if this error is due to caller input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(self, PlaybackError::InvalidPlayable { .. })
    }
}

/// Failure returned by an entitlement gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct EntitlementError {
    pub code: String,
    pub message: String,
}

impl EntitlementError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<EntitlementError> for PlaybackError {
    fn from(error: EntitlementError) -> Self {
        PlaybackError::EntitlementFailed {
            code: error.code,
            message: error.message,
        }
    }
}

/// Failure returned by a metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("Program {program_id} not found on channel {channel_id}")]
    NotFound {
        channel_id: String,
        program_id: String,
    },

    #[error("Metadata service unavailable: {reason}")]
    Unavailable { reason: String },
}

impl From<MetadataError> for PlaybackError {
    fn from(error: MetadataError) -> Self {
        PlaybackError::GenericPlaybackFailure {
            message: error.to_string(),
        }
    }
}

/// Failure reading a persisted offline grant.
#[derive(Debug, Error)]
pub enum GrantStoreError {
    #[error("No persisted grant at {path}")]
    Missing { path: String },

    #[error("Malformed persisted grant at {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl From<GrantStoreError> for PlaybackError {
    fn from(error: GrantStoreError) -> Self {
        PlaybackError::GenericPlaybackFailure {
            message: error.to_string(),
        }
    }
}

/// Why a start position was left to the tech's default.
///
/// Start resolution proceeds when program details cannot be fetched, which
/// can hide a backend failure behind "play from default". Listeners get a
/// `PlaybackEvent::StartDegraded` carrying this value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartFallback {
    #[error("Program details unavailable: {reason}")]
    ProgramDetailsUnavailable { reason: String },
}
