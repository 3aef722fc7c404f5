//! Collaborator boundaries of the playback orchestrator.
//!
//! The orchestrator never talks to a backend, a decoder or the file system
//! directly. Everything outside the orchestration logic sits behind one of
//! these traits and is handed to `spawn_orchestrator` at construction, so
//! tests and the simulator can substitute their own implementations.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::{EntitlementError, GrantStoreError, MetadataError};
use crate::model::{DrmProperties, Grant, Program};
use crate::policy::ResolvedStart;

/// Issues grants for play requests.
#[async_trait]
pub trait EntitlementGateway: Send + Sync {
    /// Requests a grant for a video-on-demand asset.
    ///
    /// # Errors
    /// - `EntitlementError` - Backend refused or could not be reached
    async fn play_vod(&self, asset_id: &str) -> Result<Grant, EntitlementError>;

    /// Requests a grant for a program on a channel (catch-up or live program).
    ///
    /// # Errors
    /// - `EntitlementError` - Backend refused or could not be reached
    async fn play_catchup(
        &self,
        channel_id: &str,
        program_id: &str,
    ) -> Result<Grant, EntitlementError>;

    /// Requests a grant for a live channel.
    ///
    /// # Errors
    /// - `EntitlementError` - Backend refused or could not be reached
    async fn play_live(&self, channel_id: &str) -> Result<Grant, EntitlementError>;
}

/// Resolves program details and EPG listings.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Full details, including schedule, of one program.
    ///
    /// # Errors
    /// - `MetadataError::NotFound` - Unknown channel or program
    /// - `MetadataError::Unavailable` - Lookup service failure
    async fn program_details(
        &self,
        channel_id: &str,
        program_id: &str,
    ) -> Result<Program, MetadataError>;

    /// Programs on `channel_id` airing within `window` around `at`.
    ///
    /// With a zero window the result is the program covering `at`, if any.
    ///
    /// # Errors
    /// - `MetadataError::Unavailable` - Lookup service failure
    async fn epg_at(
        &self,
        channel_id: &str,
        at: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<Program>, MetadataError>;
}

/// Reads grants persisted alongside downloaded media.
pub trait GrantStore: Send + Sync {
    /// Loads the grant stored for the offline manifest at `manifest_path`.
    ///
    /// # Errors
    /// - `GrantStoreError::Missing` - No grant persisted for this manifest
    /// - `GrantStoreError::Malformed` - Persisted grant cannot be decoded
    /// - `GrantStoreError::Io` - Grant file could not be read
    fn load_grant(&self, manifest_path: &Path) -> Result<Grant, GrantStoreError>;
}

/// Wall-clock source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Everything the tech needs before loading media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechSetup {
    pub session_id: String,
    pub play_token: String,
    pub start: ResolvedStart,
    pub autoplay: bool,
    pub native_controls: bool,
    pub drm: Option<DrmProperties>,
}

/// Media engine that decodes and renders the stream.
///
/// Effectors take `&mut self`; sensors report what the engine currently
/// sees. The tech is owned by the orchestrator actor and only ever called
/// from it.
pub trait PlaybackTech: Send {
    fn init(&mut self, setup: &TechSetup);
    fn load(&mut self, media_id: &str, locator: &str, is_offline: bool);
    fn play(&mut self, locator: &str);
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn seek_to(&mut self, position_ms: i64);
    fn seek_to_time(&mut self, unix_ms: i64);
    fn set_timeshift_delay(&mut self, delay_ms: i64);
    fn release(&mut self);

    /// Playhead position within the media, milliseconds.
    fn playhead_position_ms(&self) -> Option<i64>;
    /// Wall-clock time of the frame at the playhead, unix milliseconds.
    fn playhead_time_ms(&self) -> Option<i64>;
    /// Inclusive unix-millisecond range the tech can seek within.
    fn seekable_time_range(&self) -> Option<(i64, i64)>;
    fn current_bitrate(&self) -> Option<u32>;
    fn audio_tracks(&self) -> Vec<String>;
}
