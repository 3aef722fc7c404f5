//! Per-request playback properties and start policies.

use std::fmt;
use std::str::FromStr;

/// Where the caller asked playback to start.
///
/// Absent (`None` in `PlaybackProperties`) means "unset": the start policy
/// resolver picks the default for the playable kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartPolicy {
    Beginning,
    LiveEdge,
    Bookmark,
    ExplicitTime(i64),
}

impl FromStr for StartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginning" => Ok(StartPolicy::Beginning),
            "live-edge" | "live_edge" | "live" => Ok(StartPolicy::LiveEdge),
            "bookmark" => Ok(StartPolicy::Bookmark),
            other => other
                .parse::<i64>()
                .map(StartPolicy::ExplicitTime)
                .map_err(|_| format!("Invalid start policy: {s}")),
        }
    }
}

impl fmt::Display for StartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartPolicy::Beginning => f.write_str("beginning"),
            StartPolicy::LiveEdge => f.write_str("live-edge"),
            StartPolicy::Bookmark => f.write_str("bookmark"),
            StartPolicy::ExplicitTime(unix_ms) => write!(f, "{unix_ms}"),
        }
    }
}

/// License acquisition settings handed to the tech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrmProperties {
    pub license_server_url: String,
    pub init_data_base64: Option<String>,
}

/// Options supplied with a play request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackProperties {
    /// Issue the tech `play` instruction right after loading
    pub autoplay: bool,
    /// Let the tech render its own controls
    pub native_controls: bool,
    /// Requested start policy, `None` for the kind's default
    pub start_policy: Option<StartPolicy>,
    /// DRM settings used when the grant does not carry any
    pub drm: Option<DrmProperties>,
}

impl Default for PlaybackProperties {
    fn default() -> Self {
        Self {
            autoplay: true,
            native_controls: true,
            start_policy: None,
            drm: None,
        }
    }
}

impl PlaybackProperties {
    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn with_native_controls(mut self, native_controls: bool) -> Self {
        self.native_controls = native_controls;
        self
    }

    pub fn with_start_policy(mut self, start_policy: StartPolicy) -> Self {
        self.start_policy = Some(start_policy);
        self
    }

    pub fn with_drm(mut self, drm: DrmProperties) -> Self {
        self.drm = Some(drm);
        self
    }
}
