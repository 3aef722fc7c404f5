//! Entitlement grants.

use serde::{Deserialize, Serialize};

use super::properties::DrmProperties;

/// Path marker of live-formatted (smooth streaming origin) manifests.
const LIVE_FORMAT_MARKER: &str = ".isml";

/// Immutable snapshot of an entitlement issued for one play request.
///
/// A grant is never mutated once issued; re-entitlement produces a new one.
/// The serialized form is what the offline grant store persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    pub session_id: String,
    pub media_locator: String,
    pub play_token: String,
    pub ff_enabled: bool,
    pub rw_enabled: bool,
    pub timeshift_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_viewed_offset_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_viewed_at_unix_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_edge_unix_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drm_init_data: Option<String>,
}

impl Grant {
    /// Creates a grant with every trick-play operation allowed and no bookmark.
    pub fn new(
        session_id: impl Into<String>,
        media_locator: impl Into<String>,
        play_token: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            media_locator: media_locator.into(),
            play_token: play_token.into(),
            ff_enabled: true,
            rw_enabled: true,
            timeshift_enabled: true,
            channel_id: None,
            program_id: None,
            asset_id: None,
            last_viewed_offset_ms: None,
            last_viewed_at_unix_ms: None,
            live_edge_unix_ms: None,
            license_server_url: None,
            drm_init_data: None,
        }
    }

    pub fn with_trick_play(
        mut self,
        ff_enabled: bool,
        rw_enabled: bool,
        timeshift_enabled: bool,
    ) -> Self {
        self.ff_enabled = ff_enabled;
        self.rw_enabled = rw_enabled;
        self.timeshift_enabled = timeshift_enabled;
        self
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_program(
        mut self,
        channel_id: impl Into<String>,
        program_id: impl Into<String>,
    ) -> Self {
        self.channel_id = Some(channel_id.into());
        self.program_id = Some(program_id.into());
        self
    }

    pub fn with_asset(mut self, asset_id: impl Into<String>) -> Self {
        self.asset_id = Some(asset_id.into());
        self
    }

    pub fn with_bookmark(mut self, offset_ms: i64, viewed_at_unix_ms: i64) -> Self {
        self.last_viewed_offset_ms = Some(offset_ms);
        self.last_viewed_at_unix_ms = Some(viewed_at_unix_ms);
        self
    }

    pub fn with_live_edge(mut self, live_edge_unix_ms: i64) -> Self {
        self.live_edge_unix_ms = Some(live_edge_unix_ms);
        self
    }

    pub fn with_drm(
        mut self,
        license_server_url: impl Into<String>,
        init_data: Option<String>,
    ) -> Self {
        self.license_server_url = Some(license_server_url.into());
        self.drm_init_data = init_data;
        self
    }

    /// True when the locator points at a live-formatted manifest.
    ///
    /// Checks the URL path when the locator parses as a URL, the raw string otherwise.
    pub fn is_live_formatted(&self) -> bool {
        match url::Url::parse(&self.media_locator) {
            Ok(url) => url.path().contains(LIVE_FORMAT_MARKER),
            Err(_) => self.media_locator.contains(LIVE_FORMAT_MARKER),
        }
    }

    /// True when both bookmark fields were returned by the backend.
    pub fn has_bookmark(&self) -> bool {
        self.last_viewed_offset_ms.is_some() && self.last_viewed_at_unix_ms.is_some()
    }

    /// Resume position for a bookmark start.
    ///
    /// Live-formatted streams resume at the grant's live edge time, everything
    /// else at the last viewed offset. `None` without a complete bookmark, or
    /// on a live-formatted stream without a live edge.
    pub fn bookmark_position_ms(&self) -> Option<i64> {
        if !self.has_bookmark() {
            return None;
        }
        if self.is_live_formatted() {
            self.live_edge_unix_ms
        } else {
            self.last_viewed_offset_ms
        }
    }

    /// DRM settings the tech must be initialised with, if the grant carries a license server.
    pub fn drm_properties(&self) -> Option<DrmProperties> {
        self.license_server_url
            .as_ref()
            .map(|license_server_url| DrmProperties {
                license_server_url: license_server_url.clone(),
                init_data_base64: self.drm_init_data.clone(),
            })
    }
}
