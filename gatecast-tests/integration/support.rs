//! Shared setup for tests driving the orchestrator on the simulation.

use std::sync::Arc;
use std::time::Duration;

use gatecast_core::config::GatecastConfig;
use gatecast_core::events::{EventSubscription, PlaybackEvent};
use gatecast_core::model::{Playable, PlaybackProperties};
use gatecast_core::offline::JsonGrantStore;
use gatecast_core::orchestrator::test_mocks::{ManualClock, events_until, reference_time};
use gatecast_core::orchestrator::{Collaborators, PlayerHandle, spawn_orchestrator};
use gatecast_core::traits::GrantStore;
use gatecast_sim::{SimulatedCatalog, SimulationEnvironment, TechMonitor, TechSnapshot};

/// Player running on a simulation whose clock the test controls.
pub struct SimPlayer {
    pub player: PlayerHandle,
    pub events: EventSubscription,
    pub monitor: TechMonitor,
    pub clock: ManualClock,
    pub environment: SimulationEnvironment,
    pub collaborators: Collaborators,
}

impl SimPlayer {
    /// Default catalog at the reference time, with a JSON grant store.
    pub fn start() -> Self {
        Self::start_at(reference_time())
    }

    pub fn start_at(now: chrono::DateTime<chrono::Utc>) -> Self {
        Self::with_grant_store(now, Arc::new(JsonGrantStore::default()))
    }

    pub fn with_grant_store(
        now: chrono::DateTime<chrono::Utc>,
        grant_store: Arc<dyn GrantStore>,
    ) -> Self {
        let config = GatecastConfig::for_testing();
        let clock = ManualClock::new(now);
        let environment = SimulationEnvironment::with_catalog(
            &config,
            SimulatedCatalog::with_default_content(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let collaborators = environment.collaborators(grant_store);
        let tech = environment.tech();
        let monitor = tech.monitor();
        let player = spawn_orchestrator(config, collaborators.clone(), tech);
        let events = player.subscribe();

        Self {
            player,
            events,
            monitor,
            clock,
            environment,
            collaborators,
        }
    }

    /// Plays `playable` and returns the events up to the first `Play` or `Error`.
    pub async fn play_until_settled(
        &mut self,
        playable: Playable,
        properties: PlaybackProperties,
    ) -> Vec<PlaybackEvent> {
        self.player.play(playable, properties).await.unwrap();
        events_until(&mut self.events, |event| {
            matches!(event, PlaybackEvent::Play | PlaybackEvent::Error(_))
        })
        .await
        .unwrap()
    }

    /// Polls the tech until `condition` holds on a snapshot.
    pub async fn wait_for_tech<F>(&self, mut condition: F) -> TechSnapshot
    where
        F: FnMut(&TechSnapshot) -> bool,
    {
        let poll = async {
            loop {
                let snapshot = self.monitor.snapshot();
                if condition(&snapshot) {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(2), poll)
            .await
            .unwrap()
    }
}

pub fn event_names(events: &[PlaybackEvent]) -> Vec<&'static str> {
    events.iter().map(PlaybackEvent::name).collect()
}
