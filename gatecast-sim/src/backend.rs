//! Simulated entitlement backend.
//!
//! Issues grants from the catalog with seeded latency jitter, so the same
//! seed always yields the same response timing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatecast_core::config::SimulationConfig;
use gatecast_core::errors::EntitlementError;
use gatecast_core::model::Grant;
use gatecast_core::traits::{Clock, EntitlementGateway};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::catalog::SimulatedCatalog;
use crate::epg::SimulatedEpg;

const CDN_BASE: &str = "https://cdn.gatecast.test";
const LICENSE_SERVER: &str = "https://license.gatecast.test/widevine";

/// Entitlement gateway answering from a `SimulatedCatalog`.
pub struct SimulatedBackend {
    catalog: Arc<SimulatedCatalog>,
    epg: SimulatedEpg,
    clock: Arc<dyn Clock>,
    rng: Mutex<ChaCha8Rng>,
    base_latency: Duration,
}

impl SimulatedBackend {
    pub fn new(
        catalog: Arc<SimulatedCatalog>,
        epg: SimulatedEpg,
        clock: Arc<dyn Clock>,
        config: &SimulationConfig,
    ) -> Self {
        let seed = config.deterministic_seed.unwrap_or_else(rand::random);
        Self {
            catalog,
            epg,
            clock,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            base_latency: Duration::from_millis(config.gateway_latency_ms),
        }
    }

    /// Base latency plus up to 50% seeded jitter.
    fn next_latency(&self) -> Duration {
        let base_ms = u64::try_from(self.base_latency.as_millis()).unwrap_or(u64::MAX);
        if base_ms == 0 {
            return Duration::ZERO;
        }
        let jitter = self.rng.lock().random_range(0..=base_ms / 2);
        Duration::from_millis(base_ms.saturating_add(jitter))
    }

    async fn simulate_round_trip(&self, request: &str) {
        let latency = self.next_latency();
        tracing::debug!("Simulated backend answering {} after {:?}", request, latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn session_id(&self, prefix: &str) -> String {
        let suffix: u32 = self.rng.lock().random();
        format!("{prefix}-{suffix:08x}")
    }
}

#[async_trait]
impl EntitlementGateway for SimulatedBackend {
    async fn play_vod(&self, asset_id: &str) -> Result<Grant, EntitlementError> {
        self.simulate_round_trip(&format!("vod {asset_id}")).await;

        let asset = self
            .catalog
            .asset(asset_id)
            .ok_or_else(|| EntitlementError::new("UNKNOWN_ASSET", format!("No asset {asset_id}")))?;
        if !asset.entitled {
            return Err(EntitlementError::new(
                "NOT_ENTITLED",
                format!("No rights for {}", asset.title),
            ));
        }

        let mut grant = Grant::new(
            self.session_id("vod"),
            format!("{CDN_BASE}/vod/{asset_id}/manifest.mpd"),
            self.session_id("token"),
        )
        .with_asset(asset_id)
        .with_trick_play(asset.ff_enabled, true, true);
        if let Some(offset) = asset.bookmark_ms {
            let viewed_at = self.clock.now() - chrono::Duration::days(1);
            grant = grant.with_bookmark(offset, viewed_at.timestamp_millis());
        }
        if asset.encrypted {
            grant = grant.with_drm(LICENSE_SERVER, None);
        }
        Ok(grant)
    }

    async fn play_catchup(
        &self,
        channel_id: &str,
        program_id: &str,
    ) -> Result<Grant, EntitlementError> {
        self.simulate_round_trip(&format!("catch-up {program_id}"))
            .await;

        let channel = self.catalog.channel(channel_id).ok_or_else(|| {
            EntitlementError::new("UNKNOWN_CHANNEL", format!("No channel {channel_id}"))
        })?;
        if !channel.entitled {
            return Err(EntitlementError::new(
                "NOT_ENTITLED",
                format!("No subscription for {}", channel.name),
            ));
        }
        let slot = self.epg.slot_of(channel_id, program_id).ok_or_else(|| {
            EntitlementError::new("UNKNOWN_PROGRAM", format!("No program {program_id}"))
        })?;
        if let Some(every) = channel.blackout_every.filter(|every| *every > 0) {
            if slot.rem_euclid(i64::from(every)) == i64::from(every) - 1 {
                return Err(EntitlementError::new(
                    "BLACKOUT",
                    format!("{program_id} is blacked out on {}", channel.name),
                ));
            }
        }

        Ok(Grant::new(
            self.session_id("catchup"),
            format!("{CDN_BASE}/{channel_id}/{program_id}.isml/manifest.mpd"),
            self.session_id("token"),
        )
        .with_program(channel_id, program_id)
        .with_trick_play(channel.trick_play, channel.trick_play, channel.timeshift)
        .with_live_edge(self.clock.now().timestamp_millis()))
    }

    async fn play_live(&self, channel_id: &str) -> Result<Grant, EntitlementError> {
        self.simulate_round_trip(&format!("live {channel_id}")).await;

        let channel = self.catalog.channel(channel_id).ok_or_else(|| {
            EntitlementError::new("UNKNOWN_CHANNEL", format!("No channel {channel_id}"))
        })?;
        if !channel.entitled {
            return Err(EntitlementError::new(
                "NOT_ENTITLED",
                format!("No subscription for {}", channel.name),
            ));
        }

        Ok(Grant::new(
            self.session_id("live"),
            format!("{CDN_BASE}/{channel_id}/live.isml/manifest.mpd"),
            self.session_id("token"),
        )
        .with_channel(channel_id)
        .with_trick_play(channel.trick_play, channel.trick_play, channel.timeshift)
        .with_live_edge(self.clock.now().timestamp_millis()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use gatecast_core::orchestrator::test_mocks::ManualClock;

    use super::*;

    fn backend() -> (SimulatedBackend, SimulatedEpg, ManualClock) {
        let catalog = Arc::new(SimulatedCatalog::with_default_content());
        let epg = SimulatedEpg::new(Arc::clone(&catalog), 30);
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap());
        let backend = SimulatedBackend::new(
            catalog,
            epg.clone(),
            Arc::new(clock.clone()),
            &SimulationConfig::deterministic_testing(),
        );
        (backend, epg, clock)
    }

    #[tokio::test]
    async fn test_live_grant_is_live_formatted() {
        let (backend, _, _) = backend();

        let grant = backend.play_live("news24").await.unwrap();

        assert!(grant.is_live_formatted());
        assert_eq!(grant.channel_id.as_deref(), Some("news24"));
        assert!(grant.ff_enabled);
    }

    #[tokio::test]
    async fn test_unsubscribed_channel_is_refused() {
        let (backend, _, _) = backend();

        let error = backend.play_live("premium").await.unwrap_err();
        assert_eq!(error.code, "NOT_ENTITLED");
    }

    #[tokio::test]
    async fn test_vod_grant_carries_catalog_rights() {
        let (backend, _, _) = backend();

        let bunny = backend.play_vod("big-buck-bunny").await.unwrap();
        assert_eq!(bunny.bookmark_position_ms(), Some(120_000));
        assert!(bunny.drm_properties().is_none());

        let sintel = backend.play_vod("sintel").await.unwrap();
        assert!(sintel.drm_properties().is_some());

        let tears = backend.play_vod("tears-of-steel").await.unwrap();
        assert!(!tears.ff_enabled);
    }

    #[tokio::test]
    async fn test_every_third_sports_slot_is_blacked_out() {
        let (backend, epg, clock) = backend();

        let mut outcomes = Vec::new();
        for _ in 0..6 {
            let program = epg.program_at("sports1", clock.now()).unwrap();
            outcomes.push(
                backend
                    .play_catchup("sports1", &program.program_id)
                    .await
                    .is_ok(),
            );
            clock.advance(chrono::Duration::minutes(30));
        }

        assert_eq!(outcomes.iter().filter(|ok| !**ok).count(), 2);
    }

    #[test]
    fn test_same_seed_gives_same_latency() {
        let config = SimulationConfig {
            gateway_latency_ms: 100,
            ..SimulationConfig::deterministic_testing()
        };
        let latencies = || {
            let catalog = Arc::new(SimulatedCatalog::with_default_content());
            let epg = SimulatedEpg::new(Arc::clone(&catalog), 30);
            let backend = SimulatedBackend::new(
                catalog,
                epg,
                Arc::new(gatecast_core::traits::SystemClock),
                &config,
            );
            (0..5).map(|_| backend.next_latency()).collect::<Vec<_>>()
        };

        let first = latencies();
        assert_eq!(first, latencies());
        assert!(first.iter().all(|latency| {
            *latency >= Duration::from_millis(100) && *latency <= Duration::from_millis(150)
        }));
    }
}
