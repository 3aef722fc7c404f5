//! Gatecast Core - Entitlement-gated playback orchestration
//!
//! This crate turns a request to play a channel, a program, a VOD asset or
//! a downloaded asset into a running playback session: it obtains a grant,
//! resolves where playback starts, drives the playback tech, keeps live and
//! catch-up sessions entitled as programs change, and enforces the trick-play
//! permissions each grant carries.

pub mod config;
pub mod errors;
pub mod events;
pub mod guard;
pub mod model;
pub mod offline;
pub mod orchestrator;
pub mod policy;
pub mod tracing_setup;
pub mod traits;

// Re-export main types for convenient access
pub use config::GatecastConfig;
pub use errors::{EntitlementError, GrantStoreError, MetadataError, PlaybackError, StartFallback};
pub use events::{EventBus, EventSubscription, PlaybackEvent, SubscriptionId};
pub use guard::TrickPlayGuard;
pub use model::{
    DrmProperties, Grant, Playable, PlayableKind, PlaybackProperties, Program, StartPolicy,
};
pub use offline::JsonGrantStore;
pub use orchestrator::{Collaborators, PlayerHandle, SessionInfo, spawn_orchestrator};
pub use policy::ResolvedStart;
pub use traits::{
    Clock, EntitlementGateway, GrantStore, MetadataLookup, PlaybackTech, SystemClock, TechSetup,
};

pub type Result<T> = std::result::Result<T, PlaybackError>;
