//! Handle for communicating with the playback orchestrator actor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::commands::OrchestratorCommand;
use super::session::SessionInfo;
use crate::errors::PlaybackError;
use crate::events::{EventBus, EventSubscription, SubscriptionId};
use crate::guard::TrickPlayGuard;
use crate::model::{Playable, PlaybackProperties, Program};

/// Handle for communicating with the playback orchestrator actor.
///
/// Cloneable and shareable across tasks. Controls return once the actor has
/// accepted the command; their outcome arrives as `PlaybackEvent`s on a
/// subscription.
#[derive(Clone)]
pub struct PlayerHandle {
    sender: mpsc::Sender<OrchestratorCommand>,
    events: Arc<EventBus>,
}

impl PlayerHandle {
    pub(crate) fn new(sender: mpsc::Sender<OrchestratorCommand>, events: Arc<EventBus>) -> Self {
        Self { sender, events }
    }

    /// Starts playback of `playable`, tearing down the current session.
    ///
    /// Progress is reported as `Init`, `EntitlementLoadStart`,
    /// `EntitlementGranted`, `Loaded` and `Play`, or `Error` on failure.
    ///
    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn play(
        &self,
        playable: Playable,
        properties: PlaybackProperties,
    ) -> Result<(), PlaybackError> {
        self.send(OrchestratorCommand::Play {
            playable,
            properties,
        })
        .await
    }

    /// Pauses the session if its grant allows timeshift.
    ///
    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn pause(&self) -> Result<(), PlaybackError> {
        self.send(OrchestratorCommand::Pause).await
    }

    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn resume(&self) -> Result<(), PlaybackError> {
        self.send(OrchestratorCommand::Resume).await
    }

    /// Ends the session and stops the tech.
    ///
    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn stop(&self) -> Result<(), PlaybackError> {
        self.send(OrchestratorCommand::Stop).await
    }

    /// Seeks to a media position. Ignored when the grant forbids the direction.
    ///
    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn seek_to(&self, position_ms: i64) -> Result<(), PlaybackError> {
        self.send(OrchestratorCommand::SeekTo { position_ms }).await
    }

    /// Seeks to a wall-clock time.
    ///
    /// Outside the tech's seekable range the program airing at `unix_ms` is
    /// played instead, starting at that time.
    ///
    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn seek_to_time(&self, unix_ms: i64) -> Result<(), PlaybackError> {
        self.send(OrchestratorCommand::SeekToTime { unix_ms }).await
    }

    /// Plays a live session `delay` behind the live edge, once the user is
    /// entitled to the program airing at that point.
    ///
    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn set_timeshift_delay(&self, delay: Duration) -> Result<(), PlaybackError> {
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        self.send(OrchestratorCommand::SetTimeshiftDelay { delay_ms })
            .await
    }

    /// Trick-play permissions of the current grant; all allowed without a session.
    ///
    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn trick_play(&self) -> Result<TrickPlayGuard, PlaybackError> {
        self.request(|responder| OrchestratorCommand::GetTrickPlay { responder })
            .await
    }

    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn can_seek_forward(&self) -> Result<bool, PlaybackError> {
        Ok(self.trick_play().await?.can_seek_forward())
    }

    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn can_seek_back(&self) -> Result<bool, PlaybackError> {
        Ok(self.trick_play().await?.can_seek_back())
    }

    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn can_pause(&self) -> Result<bool, PlaybackError> {
        Ok(self.trick_play().await?.can_pause())
    }

    /// Program currently playing on a channel or program session.
    ///
    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn current_program(&self) -> Result<Option<Program>, PlaybackError> {
        self.request(|responder| OrchestratorCommand::GetCurrentProgram { responder })
            .await
    }

    /// Session id of the active session; offline sessions use `offline-<uuid>`.
    ///
    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn session_id(&self) -> Result<Option<String>, PlaybackError> {
        Ok(self.session_info().await?.map(|info| info.session_id))
    }

    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn session_info(&self) -> Result<Option<SessionInfo>, PlaybackError> {
        self.request(|responder| OrchestratorCommand::GetSessionInfo { responder })
            .await
    }

    /// Registers a listener for events emitted from now on.
    pub fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Tears down the session, releases the tech and stops the actor.
    ///
    /// Every later call on any clone of this handle fails.
    ///
    /// # Errors
    /// - `PlaybackError::OrchestratorShutdown` - Actor no longer running
    pub async fn dispose(&self) -> Result<(), PlaybackError> {
        self.request(|responder| OrchestratorCommand::Dispose { responder })
            .await
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn send(&self, command: OrchestratorCommand) -> Result<(), PlaybackError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| PlaybackError::OrchestratorShutdown)
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> OrchestratorCommand,
    ) -> Result<R, PlaybackError> {
        let (responder, rx) = oneshot::channel();
        self.send(command(responder)).await?;
        rx.await.map_err(|_| PlaybackError::OrchestratorShutdown)
    }
}
