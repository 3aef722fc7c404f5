//! Playable content and EPG programs.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PlaybackError;

/// A scheduled program on a channel.
///
/// Start and end are optional: a program addressed only by its ids is
/// "underspecified" and needs a metadata lookup before start resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub channel_id: String,
    pub program_id: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Program {
    /// Creates an underspecified program reference.
    pub fn new(channel_id: impl Into<String>, program_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            program_id: program_id.into(),
            start: None,
            end: None,
        }
    }

    /// Attaches the broadcast schedule.
    pub fn with_schedule(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Start and end when both are known.
    pub fn schedule(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.start.zip(self.end)
    }

    pub fn is_underspecified(&self) -> bool {
        self.schedule().is_none()
    }

    /// True when `instant` falls in `[start, end)`.
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.schedule()
            .is_some_and(|(start, end)| start <= instant && instant < end)
    }

    /// True when the program is on air at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.covers(now)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.program_id)
    }
}

/// Content addressed by a play request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playable {
    Channel { channel_id: String },
    Program(Program),
    Asset { asset_id: String },
    OfflineAsset { local_path: PathBuf },
}

/// Discriminant of a `Playable`, carried in events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayableKind {
    Channel,
    Program,
    Asset,
    OfflineAsset,
}

impl fmt::Display for PlayableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayableKind::Channel => "channel",
            PlayableKind::Program => "program",
            PlayableKind::Asset => "asset",
            PlayableKind::OfflineAsset => "offline asset",
        };
        f.write_str(name)
    }
}

impl Playable {
    pub fn channel(channel_id: impl Into<String>) -> Self {
        Playable::Channel {
            channel_id: channel_id.into(),
        }
    }

    pub fn asset(asset_id: impl Into<String>) -> Self {
        Playable::Asset {
            asset_id: asset_id.into(),
        }
    }

    pub fn offline(local_path: impl Into<PathBuf>) -> Self {
        Playable::OfflineAsset {
            local_path: local_path.into(),
        }
    }

    pub fn kind(&self) -> PlayableKind {
        match self {
            Playable::Channel { .. } => PlayableKind::Channel,
            Playable::Program(_) => PlayableKind::Program,
            Playable::Asset { .. } => PlayableKind::Asset,
            Playable::OfflineAsset { .. } => PlayableKind::OfflineAsset,
        }
    }

    /// Channel the content airs on, for live and catch-up playables.
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            Playable::Channel { channel_id } => Some(channel_id),
            Playable::Program(program) => Some(&program.channel_id),
            Playable::Asset { .. } | Playable::OfflineAsset { .. } => None,
        }
    }

    pub fn program(&self) -> Option<&Program> {
        match self {
            Playable::Program(program) => Some(program),
            _ => None,
        }
    }

    /// Live and catch-up sessions run a revalidation loop; VOD and offline never do.
    pub fn needs_revalidation(&self) -> bool {
        matches!(self, Playable::Channel { .. } | Playable::Program(_))
    }

    /// Checks that every identifier the request needs is present.
    ///
    /// # Errors
    ///
    /// - `PlaybackError::InvalidPlayable` - Missing identifier or inverted schedule
    pub fn validate(&self) -> Result<(), PlaybackError> {
        let missing = |field: &str| PlaybackError::InvalidPlayable {
            reason: format!("{} has an empty {field}", self.kind()),
        };

        match self {
            Playable::Channel { channel_id } if channel_id.trim().is_empty() => {
                Err(missing("channel id"))
            }
            Playable::Program(program) if program.channel_id.trim().is_empty() => {
                Err(missing("channel id"))
            }
            Playable::Program(program) if program.program_id.trim().is_empty() => {
                Err(missing("program id"))
            }
            Playable::Program(Program {
                start: Some(start),
                end: Some(end),
                ..
            }) if end <= start => Err(PlaybackError::InvalidPlayable {
                reason: format!("program ends at {end} before it starts at {start}"),
            }),
            Playable::Asset { asset_id } if asset_id.trim().is_empty() => {
                Err(missing("asset id"))
            }
            Playable::OfflineAsset { local_path } if local_path.as_os_str().is_empty() => {
                Err(missing("local path"))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Playable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Playable::Channel { channel_id } => write!(f, "channel {channel_id}"),
            Playable::Program(program) => write!(f, "program {program}"),
            Playable::Asset { asset_id } => write!(f, "asset {asset_id}"),
            Playable::OfflineAsset { local_path } => {
                write!(f, "offline asset {}", local_path.display())
            }
        }
    }
}
