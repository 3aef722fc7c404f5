//! Start position resolution.
//!
//! Turns the requested `StartPolicy` (possibly unset) into a concrete
//! `ResolvedStart` using the playable kind, the grant and, for programs,
//! the broadcast schedule. Resolution is pure: when a program's schedule is
//! unknown it answers `StartResolution::NeedsProgramDetails` and the caller
//! performs the lookup, then resolves again with the details.

use chrono::{DateTime, Utc};

use crate::errors::StartFallback;
use crate::model::{Grant, Playable, Program, StartPolicy};

/// Concrete start instruction handed to the tech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedStart {
    /// Join at the live edge; the tech picks the exact position.
    LiveEdge,
    /// Start of the media (VOD, offline, or a channel's DVR window).
    StartOfMedia,
    /// Program start, unix milliseconds.
    Beginning(i64),
    /// Bookmark resume position: unix milliseconds on live-formatted
    /// streams, media offset otherwise.
    Bookmark(i64),
    /// Caller-supplied unix milliseconds.
    ExplicitTime(i64),
    /// No policy could be applied; the tech's own default is used.
    TechDefault { fallback: StartFallback },
}

impl ResolvedStart {
    /// Millisecond value carried by the instruction, if any.
    pub fn position_ms(&self) -> Option<i64> {
        match self {
            ResolvedStart::Beginning(ms)
            | ResolvedStart::Bookmark(ms)
            | ResolvedStart::ExplicitTime(ms) => Some(*ms),
            ResolvedStart::LiveEdge
            | ResolvedStart::StartOfMedia
            | ResolvedStart::TechDefault { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ResolvedStart::TechDefault { .. })
    }
}

/// Outcome of a resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartResolution {
    Resolved(ResolvedStart),
    /// The program's schedule is unknown; look it up and resolve again.
    NeedsProgramDetails,
}

/// Program start policies that depend on the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScheduledStart {
    Unset,
    Beginning,
    LiveEdge,
}

/// Resolves the start position for a play request.
///
/// `program_details` replaces the playable's own program when the caller
/// already looked it up. `now` decides whether a program is live.
pub fn resolve(
    playable: &Playable,
    requested: Option<StartPolicy>,
    grant: &Grant,
    program_details: Option<&Program>,
    now: DateTime<Utc>,
) -> StartResolution {
    match playable {
        Playable::Channel { .. } => StartResolution::Resolved(resolve_channel(requested, grant)),
        Playable::Program(program) => {
            resolve_program(program_details.unwrap_or(program), requested, grant, now)
        }
        Playable::Asset { .. } | Playable::OfflineAsset { .. } => {
            StartResolution::Resolved(resolve_asset(requested, grant))
        }
    }
}

/// Start used when program details could not be obtained.
pub fn fallback_without_program_details(reason: impl Into<String>) -> ResolvedStart {
    ResolvedStart::TechDefault {
        fallback: StartFallback::ProgramDetailsUnavailable {
            reason: reason.into(),
        },
    }
}

fn resolve_channel(requested: Option<StartPolicy>, grant: &Grant) -> ResolvedStart {
    match requested {
        None | Some(StartPolicy::LiveEdge) => ResolvedStart::LiveEdge,
        Some(StartPolicy::Bookmark) => grant
            .bookmark_position_ms()
            .map_or(ResolvedStart::LiveEdge, ResolvedStart::Bookmark),
        Some(StartPolicy::Beginning) => ResolvedStart::StartOfMedia,
        Some(StartPolicy::ExplicitTime(unix_ms)) => ResolvedStart::ExplicitTime(unix_ms),
    }
}

fn resolve_asset(requested: Option<StartPolicy>, grant: &Grant) -> ResolvedStart {
    match requested {
        None | Some(StartPolicy::Beginning) => ResolvedStart::StartOfMedia,
        // A missing bookmark clears the policy, which for media is its start.
        Some(StartPolicy::Bookmark) => grant
            .bookmark_position_ms()
            .map_or(ResolvedStart::StartOfMedia, ResolvedStart::Bookmark),
        Some(StartPolicy::LiveEdge) => ResolvedStart::LiveEdge,
        Some(StartPolicy::ExplicitTime(unix_ms)) => ResolvedStart::ExplicitTime(unix_ms),
    }
}

fn resolve_program(
    program: &Program,
    requested: Option<StartPolicy>,
    grant: &Grant,
    now: DateTime<Utc>,
) -> StartResolution {
    let scheduled = match requested {
        Some(StartPolicy::ExplicitTime(unix_ms)) => {
            return StartResolution::Resolved(ResolvedStart::ExplicitTime(unix_ms));
        }
        Some(StartPolicy::Bookmark) => match grant.bookmark_position_ms() {
            Some(position) => return StartResolution::Resolved(ResolvedStart::Bookmark(position)),
            None => ScheduledStart::Unset,
        },
        Some(StartPolicy::Beginning) => ScheduledStart::Beginning,
        Some(StartPolicy::LiveEdge) => ScheduledStart::LiveEdge,
        None => ScheduledStart::Unset,
    };

    let Some((start, _end)) = program.schedule() else {
        return StartResolution::NeedsProgramDetails;
    };

    let resolved = match scheduled {
        ScheduledStart::LiveEdge => ResolvedStart::LiveEdge,
        ScheduledStart::Unset if program.is_live_at(now) => ResolvedStart::LiveEdge,
        ScheduledStart::Unset | ScheduledStart::Beginning => {
            ResolvedStart::Beginning(start.timestamp_millis())
        }
    };
    StartResolution::Resolved(resolved)
}
