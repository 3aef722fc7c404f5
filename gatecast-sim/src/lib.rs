//! Gatecast Simulation - Deterministic collaborators for playback orchestration.
//!
//! This crate provides stand-ins for everything the playback orchestrator
//! talks to: an entitlement backend with seeded latency, a slot-based EPG,
//! and a playback tech with a clock-driven virtual playhead. Together they
//! let the orchestrator run end to end without a backend or a decoder.
//!
//! # Example
//!
//! ```rust,no_run
//! use gatecast_core::config::GatecastConfig;
//! use gatecast_core::model::{Playable, PlaybackProperties};
//! use gatecast_core::offline::JsonGrantStore;
//! use gatecast_core::orchestrator::spawn_orchestrator;
//! use gatecast_sim::SimulationEnvironment;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatecastConfig::for_development();
//! let environment = SimulationEnvironment::new(&config)?;
//! let collaborators = environment.collaborators(Arc::new(JsonGrantStore::new(&config.offline)));
//!
//! let player = spawn_orchestrator(config, collaborators, environment.tech());
//! player.play(Playable::channel("news24"), PlaybackProperties::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod catalog;
pub mod epg;
pub mod tech;

use std::sync::Arc;

use gatecast_core::config::GatecastConfig;
use gatecast_core::orchestrator::Collaborators;
use gatecast_core::traits::{Clock, GrantStore, SystemClock};

pub use backend::SimulatedBackend;
pub use catalog::{SimulatedAsset, SimulatedCatalog, SimulatedChannel};
pub use epg::SimulatedEpg;
pub use tech::{SimulatedTech, TechMonitor, TechSnapshot, TechState};

/// Errors raised while assembling a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Simulation mode is disabled in the configuration")]
    Disabled,

    #[error("Invalid simulation configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Simulated backend, EPG and clock sharing one catalog.
pub struct SimulationEnvironment {
    catalog: Arc<SimulatedCatalog>,
    epg: SimulatedEpg,
    backend: Arc<SimulatedBackend>,
    clock: Arc<dyn Clock>,
}

impl SimulationEnvironment {
    /// Builds the default catalog on the system clock.
    ///
    /// # Errors
    /// - `SimulationError::Disabled` - Simulation not enabled in `config`
    /// - `SimulationError::InvalidConfig` - Program slots of zero minutes
    pub fn new(config: &GatecastConfig) -> Result<Self, SimulationError> {
        Self::with_catalog(
            config,
            SimulatedCatalog::with_default_content(),
            Arc::new(SystemClock),
        )
    }

    /// Builds an environment around a custom catalog and clock.
    ///
    /// # Errors
    /// - `SimulationError::Disabled` - Simulation not enabled in `config`
    /// - `SimulationError::InvalidConfig` - Program slots of zero minutes
    pub fn with_catalog(
        config: &GatecastConfig,
        catalog: SimulatedCatalog,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SimulationError> {
        let simulation = &config.simulation;
        if !simulation.enabled {
            return Err(SimulationError::Disabled);
        }
        if simulation.program_slot_minutes == 0 {
            return Err(SimulationError::InvalidConfig {
                reason: "program_slot_minutes must be positive".to_string(),
            });
        }

        let catalog = Arc::new(catalog);
        let epg = SimulatedEpg::new(Arc::clone(&catalog), simulation.program_slot_minutes);
        let backend = Arc::new(SimulatedBackend::new(
            Arc::clone(&catalog),
            epg.clone(),
            Arc::clone(&clock),
            simulation,
        ));

        tracing::info!(
            "Simulation ready: {} channels, {} assets, seed {:?}",
            catalog.channel_ids().len(),
            catalog.asset_ids().len(),
            simulation.deterministic_seed
        );

        Ok(Self {
            catalog,
            epg,
            backend,
            clock,
        })
    }

    pub fn catalog(&self) -> &SimulatedCatalog {
        &self.catalog
    }

    pub fn epg(&self) -> &SimulatedEpg {
        &self.epg
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Orchestrator collaborators backed by this simulation.
    pub fn collaborators(&self, grant_store: Arc<dyn GrantStore>) -> Collaborators {
        Collaborators::new(
            self.backend.clone(),
            Arc::new(self.epg.clone()),
            grant_store,
        )
        .with_clock(Arc::clone(&self.clock))
    }

    /// A fresh simulated tech on this environment's clock.
    pub fn tech(&self) -> SimulatedTech {
        SimulatedTech::new(Arc::clone(&self.clock))
    }
}
