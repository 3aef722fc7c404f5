//! Mock collaborators for testing the playback orchestrator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use super::Collaborators;
use crate::errors::{EntitlementError, GrantStoreError, MetadataError};
use crate::events::{EventSubscription, PlaybackEvent};
use crate::model::{Grant, Program};
use crate::traits::{
    Clock, EntitlementGateway, GrantStore, MetadataLookup, PlaybackTech, TechSetup,
};

/// How long test helpers wait for an expected event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Fixed reference time used by tests: 2024-03-01 20:00 UTC.
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Gateway request recorded by `MockGateway`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Vod(String),
    Catchup(String, String),
    Live(String),
}

#[derive(Default)]
struct GatewayState {
    overrides: HashMap<String, Result<Grant, EntitlementError>>,
    latency: HashMap<String, Duration>,
    calls: Vec<GatewayCall>,
}

/// Gateway issuing a predictable grant for every request.
///
/// Responses are keyed by asset id, program id or channel id. Without an
/// override a grant with every trick-play operation allowed is returned;
/// live and program grants point at live-formatted locators.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the response for requests on `id`.
    pub fn set_grant(&self, id: &str, grant: Grant) {
        self.state.lock().overrides.insert(id.to_string(), Ok(grant));
    }

    /// Refuses requests on `id`.
    pub fn deny(&self, id: &str, code: &str) {
        self.state.lock().overrides.insert(
            id.to_string(),
            Err(EntitlementError::new(code, format!("{id} not entitled"))),
        );
    }

    /// Delays responses for requests on `id`.
    pub fn set_latency(&self, id: &str, latency: Duration) {
        self.state.lock().latency.insert(id.to_string(), latency);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    async fn respond(
        &self,
        id: &str,
        call: GatewayCall,
        default: impl FnOnce() -> Grant,
    ) -> Result<Grant, EntitlementError> {
        let (response, latency) = {
            let mut state = self.state.lock();
            state.calls.push(call);
            (state.overrides.get(id).cloned(), state.latency.get(id).copied())
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        response.unwrap_or_else(|| Ok(default()))
    }
}

#[async_trait]
impl EntitlementGateway for MockGateway {
    async fn play_vod(&self, asset_id: &str) -> Result<Grant, EntitlementError> {
        self.respond(asset_id, GatewayCall::Vod(asset_id.to_string()), || {
            Grant::new(
                format!("vod-{asset_id}"),
                format!("https://cdn.test/vod/{asset_id}/manifest.mpd"),
                "play-token",
            )
            .with_asset(asset_id)
        })
        .await
    }

    async fn play_catchup(
        &self,
        channel_id: &str,
        program_id: &str,
    ) -> Result<Grant, EntitlementError> {
        let call = GatewayCall::Catchup(channel_id.to_string(), program_id.to_string());
        self.respond(program_id, call, || {
            Grant::new(
                format!("catchup-{program_id}"),
                format!("https://cdn.test/{channel_id}/{program_id}.isml/manifest.mpd"),
                "play-token",
            )
            .with_program(channel_id, program_id)
        })
        .await
    }

    async fn play_live(&self, channel_id: &str) -> Result<Grant, EntitlementError> {
        self.respond(channel_id, GatewayCall::Live(channel_id.to_string()), || {
            Grant::new(
                format!("live-{channel_id}"),
                format!("https://cdn.test/{channel_id}/live.isml/manifest.mpd"),
                "play-token",
            )
            .with_channel(channel_id)
        })
        .await
    }
}

#[derive(Default)]
struct MetadataState {
    programs: Vec<Program>,
    failure: Option<MetadataError>,
    details_calls: usize,
    epg_calls: usize,
}

/// In-memory EPG.
#[derive(Clone, Default)]
pub struct MockMetadata {
    state: Arc<Mutex<MetadataState>>,
}

impl MockMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_program(&self, program: Program) {
        self.state.lock().programs.push(program);
    }

    /// Makes every lookup fail with `error` until cleared.
    pub fn fail_with(&self, error: Option<MetadataError>) {
        self.state.lock().failure = error;
    }

    pub fn details_calls(&self) -> usize {
        self.state.lock().details_calls
    }

    pub fn epg_calls(&self) -> usize {
        self.state.lock().epg_calls
    }
}

#[async_trait]
impl MetadataLookup for MockMetadata {
    async fn program_details(
        &self,
        channel_id: &str,
        program_id: &str,
    ) -> Result<Program, MetadataError> {
        let mut state = self.state.lock();
        state.details_calls += 1;
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }
        state
            .programs
            .iter()
            .find(|program| program.channel_id == channel_id && program.program_id == program_id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound {
                channel_id: channel_id.to_string(),
                program_id: program_id.to_string(),
            })
    }

    async fn epg_at(
        &self,
        channel_id: &str,
        at: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<Program>, MetadataError> {
        let mut state = self.state.lock();
        state.epg_calls += 1;
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }

        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
        let (from, to) = (at - window, at + window);
        Ok(state
            .programs
            .iter()
            .filter(|program| program.channel_id == channel_id)
            .filter(|program| match program.schedule() {
                Some((start, end)) => start <= to && from < end,
                None => false,
            })
            .cloned()
            .collect())
    }
}

/// Instruction received by `RecordingTech`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TechInstruction {
    Init(TechSetup),
    Load {
        media_id: String,
        locator: String,
        is_offline: bool,
    },
    Play(String),
    Pause,
    Resume,
    Stop,
    SeekTo(i64),
    SeekToTime(i64),
    SetTimeshiftDelay(i64),
    Release,
}

#[derive(Default)]
struct TechState {
    instructions: Vec<TechInstruction>,
    playhead_position_ms: Option<i64>,
    playhead_time_ms: Option<i64>,
    seekable_range: Option<(i64, i64)>,
}

/// Tech that records instructions and reports scripted sensor values.
///
/// Clones share state, so a test can keep one while the orchestrator owns another.
#[derive(Clone, Default)]
pub struct RecordingTech {
    state: Arc<Mutex<TechState>>,
}

impl RecordingTech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions(&self) -> Vec<TechInstruction> {
        self.state.lock().instructions.clone()
    }

    pub fn clear_instructions(&self) {
        self.state.lock().instructions.clear();
    }

    /// Number of `Load` instructions received so far.
    pub fn load_count(&self) -> usize {
        self.state
            .lock()
            .instructions
            .iter()
            .filter(|instruction| matches!(instruction, TechInstruction::Load { .. }))
            .count()
    }

    pub fn last_setup(&self) -> Option<TechSetup> {
        self.state
            .lock()
            .instructions
            .iter()
            .rev()
            .find_map(|instruction| match instruction {
                TechInstruction::Init(setup) => Some(setup.clone()),
                _ => None,
            })
    }

    pub fn set_playhead_position(&self, position_ms: Option<i64>) {
        self.state.lock().playhead_position_ms = position_ms;
    }

    pub fn set_playhead_time(&self, unix_ms: Option<i64>) {
        self.state.lock().playhead_time_ms = unix_ms;
    }

    pub fn set_seekable_range(&self, range: Option<(i64, i64)>) {
        self.state.lock().seekable_range = range;
    }

    fn record(&self, instruction: TechInstruction) {
        self.state.lock().instructions.push(instruction);
    }
}

impl PlaybackTech for RecordingTech {
    fn init(&mut self, setup: &TechSetup) {
        self.record(TechInstruction::Init(setup.clone()));
    }

    fn load(&mut self, media_id: &str, locator: &str, is_offline: bool) {
        self.record(TechInstruction::Load {
            media_id: media_id.to_string(),
            locator: locator.to_string(),
            is_offline,
        });
    }

    fn play(&mut self, locator: &str) {
        self.record(TechInstruction::Play(locator.to_string()));
    }

    fn pause(&mut self) {
        self.record(TechInstruction::Pause);
    }

    fn resume(&mut self) {
        self.record(TechInstruction::Resume);
    }

    fn stop(&mut self) {
        self.record(TechInstruction::Stop);
    }

    fn seek_to(&mut self, position_ms: i64) {
        let mut state = self.state.lock();
        state.playhead_position_ms = Some(position_ms);
        state.instructions.push(TechInstruction::SeekTo(position_ms));
    }

    fn seek_to_time(&mut self, unix_ms: i64) {
        let mut state = self.state.lock();
        state.playhead_time_ms = Some(unix_ms);
        state.instructions.push(TechInstruction::SeekToTime(unix_ms));
    }

    fn set_timeshift_delay(&mut self, delay_ms: i64) {
        self.record(TechInstruction::SetTimeshiftDelay(delay_ms));
    }

    fn release(&mut self) {
        self.record(TechInstruction::Release);
    }

    fn playhead_position_ms(&self) -> Option<i64> {
        self.state.lock().playhead_position_ms
    }

    fn playhead_time_ms(&self) -> Option<i64> {
        self.state.lock().playhead_time_ms
    }

    fn seekable_time_range(&self) -> Option<(i64, i64)> {
        self.state.lock().seekable_range
    }

    fn current_bitrate(&self) -> Option<u32> {
        None
    }

    fn audio_tracks(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Grant store backed by a map of manifest paths.
#[derive(Clone, Default)]
pub struct MemoryGrantStore {
    grants: Arc<Mutex<HashMap<PathBuf, Grant>>>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, manifest_path: impl Into<PathBuf>, grant: Grant) {
        self.grants.lock().insert(manifest_path.into(), grant);
    }
}

impl GrantStore for MemoryGrantStore {
    fn load_grant(&self, manifest_path: &Path) -> Result<Grant, GrantStoreError> {
        self.grants
            .lock()
            .get(manifest_path)
            .cloned()
            .ok_or_else(|| GrantStoreError::Missing {
                path: manifest_path.display().to_string(),
            })
    }
}

/// Mocks wired into `Collaborators`, with handles kept for assertions.
#[derive(Clone)]
pub struct MockCollaborators {
    pub gateway: MockGateway,
    pub metadata: MockMetadata,
    pub grant_store: MemoryGrantStore,
    pub clock: ManualClock,
}

impl MockCollaborators {
    pub fn new() -> Self {
        Self {
            gateway: MockGateway::new(),
            metadata: MockMetadata::new(),
            grant_store: MemoryGrantStore::new(),
            clock: ManualClock::new(reference_time()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            Arc::new(self.gateway.clone()),
            Arc::new(self.metadata.clone()),
            Arc::new(self.grant_store.clone()),
        )
        .with_clock(Arc::new(self.clock.clone()))
    }
}

impl Default for MockCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects events until one matches `done`, returning all of them.
///
/// Returns `None` if no matching event arrives within `EVENT_TIMEOUT`.
pub async fn events_until<F>(
    subscription: &mut EventSubscription,
    mut done: F,
) -> Option<Vec<PlaybackEvent>>
where
    F: FnMut(&PlaybackEvent) -> bool,
{
    let collect = async {
        let mut events = Vec::new();
        while let Some(event) = subscription.recv().await {
            let finished = done(&event);
            events.push(event);
            if finished {
                return Some(events);
            }
        }
        None
    };
    tokio::time::timeout(EVENT_TIMEOUT, collect).await.ok().flatten()
}

/// Waits for the first event matching `wanted`.
pub async fn wait_for_event<F>(
    subscription: &mut EventSubscription,
    wanted: F,
) -> Option<PlaybackEvent>
where
    F: FnMut(&PlaybackEvent) -> bool,
{
    events_until(subscription, wanted)
        .await
        .and_then(|mut events| events.pop())
}
