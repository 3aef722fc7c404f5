//! Centralized configuration for Gatecast.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

/// Central configuration for all Gatecast components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct GatecastConfig {
    pub orchestrator: OrchestratorConfig,
    pub revalidation: RevalidationConfig,
    pub offline: OfflineConfig,
    pub simulation: SimulationConfig,
}

/// Playback orchestrator actor configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Capacity of the command channel between handles and the actor
    pub command_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            command_buffer: 100,
        }
    }
}

/// Background revalidation loop configuration.
///
/// Controls how often the current program is re-checked for live and
/// catch-up sessions, and how wide the EPG window is when looking up the
/// program covering a point in time.
#[derive(Debug, Clone)]
pub struct RevalidationConfig {
    /// Delay between two program-boundary checks
    pub tick_interval: Duration,
    /// Past/future window passed to EPG lookups (zero = exact program at time)
    pub epg_window: Duration,
}

impl Default for RevalidationConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            epg_window: Duration::ZERO,
        }
    }
}

/// Offline playback configuration.
#[derive(Debug, Clone)]
pub struct OfflineConfig {
    /// File name of the persisted grant, next to the offline manifest
    pub grant_file_name: &'static str,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            grant_file_name: "entitlement.json",
        }
    }
}

/// Simulation mode configuration for development and testing.
///
/// Controls whether the simulated backend, EPG and tech are used and
/// configures them for deterministic runs.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Enable simulated collaborators
    pub enabled: bool,
    /// Deterministic seed for reproducible latency jitter
    pub deterministic_seed: Option<u64>,
    /// Base latency of simulated entitlement requests in milliseconds
    pub gateway_latency_ms: u64,
    /// Length of each simulated EPG program slot in minutes
    pub program_slot_minutes: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            deterministic_seed: None,
            gateway_latency_ms: 120,
            program_slot_minutes: 30,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for deterministic testing.
    pub fn deterministic_testing() -> Self {
        Self {
            enabled: true,
            deterministic_seed: Some(42),
            gateway_latency_ms: 0,
            program_slot_minutes: 30,
        }
    }

    /// Creates a configuration for realistic simulation.
    pub fn realistic_simulation() -> Self {
        Self {
            enabled: true,
            deterministic_seed: None,
            gateway_latency_ms: 250,
            program_slot_minutes: 30,
        }
    }
}

impl GatecastConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(interval) = std::env::var("GATECAST_REVALIDATION_INTERVAL_MS") {
            if let Ok(millis) = interval.parse::<u64>() {
                config.revalidation.tick_interval = Duration::from_millis(millis);
            }
        }

        if let Ok(buffer) = std::env::var("GATECAST_COMMAND_BUFFER") {
            if let Ok(capacity) = buffer.parse::<usize>() {
                config.orchestrator.command_buffer = capacity.max(1);
            }
        }

        if let Ok(enabled) = std::env::var("GATECAST_SIMULATION_MODE") {
            config.simulation.enabled = enabled.parse().unwrap_or(false);
        }

        if let Ok(seed) = std::env::var("GATECAST_SIMULATION_SEED") {
            if let Ok(seed_value) = seed.parse::<u64>() {
                config.simulation.deterministic_seed = Some(seed_value);
            }
        }

        if let Ok(latency) = std::env::var("GATECAST_GATEWAY_LATENCY_MS") {
            if let Ok(millis) = latency.parse::<u64>() {
                config.simulation.gateway_latency_ms = millis;
            }
        }

        config
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Revalidation ticks fast so program boundaries are observed quickly.
    pub fn for_testing() -> Self {
        Self {
            revalidation: RevalidationConfig {
                tick_interval: Duration::from_millis(10),
                epg_window: Duration::ZERO,
            },
            simulation: SimulationConfig::deterministic_testing(),
            ..Default::default()
        }
    }

    /// Creates a configuration for development with realistic simulation.
    pub fn for_development() -> Self {
        Self {
            revalidation: RevalidationConfig {
                tick_interval: Duration::from_secs(1),
                epg_window: Duration::ZERO,
            },
            simulation: SimulationConfig::realistic_simulation(),
            ..Default::default()
        }
    }
}
