//! Playback data model: what can be played, what the backend grants, and
//! how the caller wants playback to start.

pub mod grant;
pub mod playable;
pub mod properties;

pub use grant::Grant;
pub use playable::{Playable, PlayableKind, Program};
pub use properties::{DrmProperties, PlaybackProperties, StartPolicy};
