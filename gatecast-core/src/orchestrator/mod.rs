//! Playback orchestrator using the actor model.
//!
//! A single actor owns the active session and the playback tech. Handles
//! send it commands over a channel; entitlement requests, metadata lookups
//! and the revalidation loop run as separate tasks and report back through
//! an internal completion channel.

use std::sync::Arc;

use crate::traits::{Clock, EntitlementGateway, GrantStore, MetadataLookup, SystemClock};

pub mod actor;
pub mod commands;
pub mod core;
pub mod handle;
pub mod revalidation;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

#[cfg(test)]
mod integration_tests;

pub use actor::spawn_orchestrator;
pub use commands::OrchestratorCommand;
pub use handle::PlayerHandle;
pub use revalidation::RevalidationHandle;
pub use session::{SessionInfo, SessionToken};

/// Services the orchestrator delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub gateway: Arc<dyn EntitlementGateway>,
    pub metadata: Arc<dyn MetadataLookup>,
    pub grant_store: Arc<dyn GrantStore>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Collaborators using the system clock.
    pub fn new(
        gateway: Arc<dyn EntitlementGateway>,
        metadata: Arc<dyn MetadataLookup>,
        grant_store: Arc<dyn GrantStore>,
    ) -> Self {
        Self {
            gateway,
            metadata,
            grant_store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
