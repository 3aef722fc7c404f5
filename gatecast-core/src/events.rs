//! Playback notifications and their fan-out to listeners.
//!
//! Every listener owns an unbounded queue, so delivery is ordered and no
//! listener can lose events by lagging behind. A listener only sees events
//! emitted after it subscribed.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::errors::{PlaybackError, StartFallback};
use crate::model::{PlayableKind, Program};
use crate::policy::ResolvedStart;

/// Notification emitted by the playback orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A valid play request was accepted and the prior session torn down.
    Init,
    /// Entitlement acquisition started for a play request.
    EntitlementLoadStart { kind: PlayableKind },
    /// A grant became the session's active grant.
    EntitlementGranted { session_id: String },
    /// Start resolution fell back to the tech default.
    StartDegraded { fallback: StartFallback },
    /// The tech loaded the media; terminal success of a play request.
    Loaded {
        session_id: String,
        start: ResolvedStart,
    },
    Play,
    Pause,
    Resume,
    Stop,
    Dispose,
    /// The revalidation loop crossed into a new, entitled program.
    ProgramChanged(Program),
    Error(PlaybackError),
}

impl PlaybackEvent {
    /// Short name used in logs and the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackEvent::Init => "init",
            PlaybackEvent::EntitlementLoadStart { .. } => "entitlement-load-start",
            PlaybackEvent::EntitlementGranted { .. } => "entitlement-granted",
            PlaybackEvent::StartDegraded { .. } => "start-degraded",
            PlaybackEvent::Loaded { .. } => "loaded",
            PlaybackEvent::Play => "play",
            PlaybackEvent::Pause => "pause",
            PlaybackEvent::Resume => "resume",
            PlaybackEvent::Stop => "stop",
            PlaybackEvent::Dispose => "dispose",
            PlaybackEvent::ProgramChanged(_) => "program-changed",
            PlaybackEvent::Error(_) => "error",
        }
    }
}

/// Identifier returned by `EventBus::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving side of one listener registration.
#[derive(Debug)]
pub struct EventSubscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<PlaybackEvent>,
}

impl EventSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next event; `None` once unsubscribed or the bus is cleared.
    pub async fn recv(&mut self) -> Option<PlaybackEvent> {
        self.receiver.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<PlaybackEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drains every event queued so far.
    pub fn drain(&mut self) -> Vec<PlaybackEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Ordered fan-out of `PlaybackEvent`s.
#[derive(Debug, Default)]
pub struct EventBus {
    listeners: Mutex<Vec<(SubscriptionId, mpsc::UnboundedSender<PlaybackEvent>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> EventSubscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        self.listeners.lock().push((id, sender));
        EventSubscription { id, receiver }
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Delivers an event to every listener, dropping listeners whose receiver is gone.
    pub fn emit(&self, event: PlaybackEvent) {
        tracing::trace!("Emitting playback event: {}", event.name());
        let mut listeners = self.listeners.lock();
        listeners.retain(|(_, sender)| sender.send(event.clone()).is_ok());
    }

    /// Unregisters every listener.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}
