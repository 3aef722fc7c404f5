//! Simulated playback tech.
//!
//! Keeps a virtual playhead driven by the clock instead of decoding media.
//! Live-formatted locators play in wall-clock time with a DVR window; other
//! media play from offset zero.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gatecast_core::policy::ResolvedStart;
use gatecast_core::traits::{Clock, PlaybackTech, TechSetup};
use parking_lot::Mutex;

const LIVE_MARKER: &str = ".isml";
const DVR_WINDOW_MS: i64 = 2 * 60 * 60 * 1000;
const BITRATE_LADDER: [u32; 4] = [800_000, 1_600_000, 3_200_000, 6_400_000];
const BITRATE_STEP_MS: i64 = 10_000;

/// Lifecycle state of the simulated tech.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TechState {
    Idle,
    Loaded,
    Playing,
    Paused,
    Stopped,
    Released,
}

/// Point-in-time view of the simulated tech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechSnapshot {
    pub state: TechState,
    pub media_id: Option<String>,
    pub position_ms: Option<i64>,
    pub playhead_time_ms: Option<i64>,
    pub bitrate: Option<u32>,
    pub timeshift_delay_ms: i64,
}

struct Inner {
    state: TechState,
    setup: Option<TechSetup>,
    media_id: Option<String>,
    live: bool,
    /// Playhead at `anchor_time`: unix ms for live media, media offset otherwise
    anchor_position_ms: i64,
    anchor_time: DateTime<Utc>,
    playing_since: Option<DateTime<Utc>>,
    timeshift_delay_ms: i64,
}

impl Inner {
    fn position(&self, now: DateTime<Utc>) -> i64 {
        match self.state {
            TechState::Playing => {
                self.anchor_position_ms + (now - self.anchor_time).num_milliseconds()
            }
            _ => self.anchor_position_ms,
        }
    }

    fn reanchor(&mut self, position_ms: i64, now: DateTime<Utc>) {
        self.anchor_position_ms = position_ms;
        self.anchor_time = now;
    }

    fn is_active(&self) -> bool {
        matches!(
            self.state,
            TechState::Loaded | TechState::Playing | TechState::Paused
        )
    }
}

/// Playback tech with a clock-driven virtual playhead.
pub struct SimulatedTech {
    clock: Arc<dyn Clock>,
    inner: Arc<Mutex<Inner>>,
}

/// Read-only view of a `SimulatedTech` owned elsewhere.
#[derive(Clone)]
pub struct TechMonitor {
    clock: Arc<dyn Clock>,
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedTech {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            clock,
            inner: Arc::new(Mutex::new(Inner {
                state: TechState::Idle,
                setup: None,
                media_id: None,
                live: false,
                anchor_position_ms: 0,
                anchor_time: now,
                playing_since: None,
                timeshift_delay_ms: 0,
            })),
        }
    }

    pub fn monitor(&self) -> TechMonitor {
        TechMonitor {
            clock: Arc::clone(&self.clock),
            inner: Arc::clone(&self.inner),
        }
    }

    fn initial_position(start: &ResolvedStart, live: bool, now_ms: i64) -> i64 {
        match start {
            ResolvedStart::Beginning(ms)
            | ResolvedStart::Bookmark(ms)
            | ResolvedStart::ExplicitTime(ms) => *ms,
            ResolvedStart::StartOfMedia if live => now_ms - DVR_WINDOW_MS,
            ResolvedStart::LiveEdge | ResolvedStart::TechDefault { .. } if live => now_ms,
            ResolvedStart::StartOfMedia
            | ResolvedStart::LiveEdge
            | ResolvedStart::TechDefault { .. } => 0,
        }
    }
}

impl TechMonitor {
    pub fn snapshot(&self) -> TechSnapshot {
        let now = self.clock.now();
        let inner = self.inner.lock();
        let active = inner.is_active();
        let position = inner.position(now);
        TechSnapshot {
            state: inner.state,
            media_id: inner.media_id.clone(),
            position_ms: active.then_some(position),
            playhead_time_ms: (active && inner.live).then_some(position),
            bitrate: bitrate_at(&inner, now),
            timeshift_delay_ms: inner.timeshift_delay_ms,
        }
    }
}

fn bitrate_at(inner: &Inner, now: DateTime<Utc>) -> Option<u32> {
    let since = inner.playing_since?;
    let steps = (now - since).num_milliseconds() / BITRATE_STEP_MS;
    let index = usize::try_from(steps)
        .unwrap_or(0)
        .min(BITRATE_LADDER.len() - 1);
    Some(BITRATE_LADDER[index])
}

impl PlaybackTech for SimulatedTech {
    fn init(&mut self, setup: &TechSetup) {
        tracing::debug!(
            "Tech init for session {} (autoplay: {}, drm: {})",
            setup.session_id,
            setup.autoplay,
            setup.drm.is_some()
        );
        let mut inner = self.inner.lock();
        inner.setup = Some(setup.clone());
        inner.state = TechState::Idle;
        inner.playing_since = None;
        inner.timeshift_delay_ms = 0;
    }

    fn load(&mut self, media_id: &str, locator: &str, is_offline: bool) {
        tracing::info!(
            "Tech loading {} from {}{}",
            media_id,
            locator,
            if is_offline { " (offline)" } else { "" }
        );
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let live = !is_offline && locator.contains(LIVE_MARKER);
        let position = inner.setup.as_ref().map_or(0, |setup| {
            Self::initial_position(&setup.start, live, now.timestamp_millis())
        });
        inner.live = live;
        inner.media_id = Some(media_id.to_string());
        inner.state = TechState::Loaded;
        inner.reanchor(position, now);
    }

    fn play(&mut self, locator: &str) {
        tracing::debug!("Tech playing {}", locator);
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let position = inner.position(now);
        inner.reanchor(position, now);
        inner.state = TechState::Playing;
        inner.playing_since = Some(now);
    }

    fn pause(&mut self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let position = inner.position(now);
        inner.reanchor(position, now);
        inner.state = TechState::Paused;
    }

    fn resume(&mut self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if !inner.is_active() {
            return;
        }
        let position = inner.position(now);
        inner.reanchor(position, now);
        inner.state = TechState::Playing;
        inner.playing_since.get_or_insert(now);
    }

    fn stop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.state != TechState::Released {
            inner.state = TechState::Stopped;
        }
        inner.playing_since = None;
    }

    fn seek_to(&mut self, position_ms: i64) {
        tracing::debug!("Tech seeking to {}ms", position_ms);
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let target = if inner.live {
            now.timestamp_millis() - DVR_WINDOW_MS + position_ms
        } else {
            position_ms.max(0)
        };
        inner.reanchor(target, now);
    }

    fn seek_to_time(&mut self, unix_ms: i64) {
        tracing::debug!("Tech seeking to time {}", unix_ms);
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if inner.live {
            inner.reanchor(unix_ms.min(now.timestamp_millis()), now);
        }
    }

    fn set_timeshift_delay(&mut self, delay_ms: i64) {
        tracing::debug!("Tech timeshift delay {}ms", delay_ms);
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.timeshift_delay_ms = delay_ms;
        if inner.live {
            inner.reanchor(now.timestamp_millis() - delay_ms, now);
        }
    }

    fn release(&mut self) {
        tracing::debug!("Tech released");
        let mut inner = self.inner.lock();
        inner.state = TechState::Released;
        inner.setup = None;
        inner.media_id = None;
        inner.playing_since = None;
    }

    fn playhead_position_ms(&self) -> Option<i64> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        if !inner.is_active() {
            return None;
        }
        let position = inner.position(now);
        Some(if inner.live {
            position - (now.timestamp_millis() - DVR_WINDOW_MS)
        } else {
            position
        })
    }

    fn playhead_time_ms(&self) -> Option<i64> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        (inner.is_active() && inner.live).then(|| inner.position(now))
    }

    fn seekable_time_range(&self) -> Option<(i64, i64)> {
        let inner = self.inner.lock();
        if !(inner.is_active() && inner.live) {
            return None;
        }
        let now_ms = self.clock.now().timestamp_millis();
        Some((now_ms - DVR_WINDOW_MS, now_ms))
    }

    fn current_bitrate(&self) -> Option<u32> {
        bitrate_at(&self.inner.lock(), self.clock.now())
    }

    fn audio_tracks(&self) -> Vec<String> {
        if self.inner.lock().is_active() {
            vec!["en".to_string(), "sv".to_string()]
        } else {
            Vec::new()
        }
    }
}
