//! Integration tests for Gatecast
//!
//! These tests run the playback orchestrator end to end against the
//! simulated backend, EPG and tech, checking that the pieces agree on
//! grants, program boundaries and offline storage.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/sim_playback.rs"]
mod sim_playback;

#[path = "integration/sim_revalidation.rs"]
mod sim_revalidation;

#[path = "integration/offline_playback.rs"]
mod offline_playback;
