//! Actor running the playback orchestrator.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::Collaborators;
use super::commands::{OrchestratorCommand, SessionCompletion};
use super::core::PlaybackOrchestrator;
use super::handle::PlayerHandle;
use crate::config::GatecastConfig;
use crate::events::EventBus;
use crate::traits::PlaybackTech;

/// Spawns the playback orchestrator actor and returns its handle.
///
/// The actor owns the tech and the session. Commands from handles and
/// completions of background work are processed one at a time, so no two
/// session transitions ever interleave.
///
/// # Examples
/// ```rust,no_run
/// use gatecast_core::config::GatecastConfig;
/// use gatecast_core::model::{Playable, PlaybackProperties};
/// use gatecast_core::orchestrator::{Collaborators, spawn_orchestrator};
/// use gatecast_core::traits::PlaybackTech;
///
/// async fn watch(collaborators: Collaborators, tech: impl PlaybackTech + 'static) {
///     let player = spawn_orchestrator(GatecastConfig::default(), collaborators, tech);
///     let mut events = player.subscribe();
///     player.play(Playable::channel("ch1"), PlaybackProperties::default()).await.unwrap();
///     while let Some(event) = events.recv().await {
///         println!("{}", event.name());
///     }
/// }
/// ```
pub fn spawn_orchestrator<T>(
    config: GatecastConfig,
    collaborators: Collaborators,
    tech: T,
) -> PlayerHandle
where
    T: PlaybackTech + 'static,
{
    let (sender, receiver) = mpsc::channel(config.orchestrator.command_buffer.max(1));
    let (completion_sender, completion_receiver) = mpsc::unbounded_channel();
    let events = Arc::new(EventBus::new());
    let orchestrator = PlaybackOrchestrator::new(
        config,
        collaborators,
        tech,
        Arc::clone(&events),
        completion_sender,
    );

    tokio::spawn(async move {
        run_actor_loop(orchestrator, receiver, completion_receiver).await;
    });

    PlayerHandle::new(sender, events)
}

/// Processes commands and completions until disposed or every handle is dropped.
async fn run_actor_loop<T>(
    mut orchestrator: PlaybackOrchestrator<T>,
    mut receiver: mpsc::Receiver<OrchestratorCommand>,
    mut completions: mpsc::UnboundedReceiver<SessionCompletion>,
) where
    T: PlaybackTech + 'static,
{
    tracing::debug!("Playback orchestrator actor started");

    loop {
        tokio::select! {
            command = receiver.recv() => {
                let Some(command) = command else {
                    tracing::debug!("All player handles dropped");
                    orchestrator.dispose().await;
                    break;
                };
                if !handle_command(&mut orchestrator, &mut receiver, command).await {
                    break;
                }
            }
            Some(completion) = completions.recv() => {
                orchestrator.handle_completion(completion).await;
            }
        }
    }

    tracing::debug!("Playback orchestrator actor stopped");
}

/// Handles a single command.
/// Returns true to continue processing, false to shutdown.
async fn handle_command<T>(
    orchestrator: &mut PlaybackOrchestrator<T>,
    receiver: &mut mpsc::Receiver<OrchestratorCommand>,
    command: OrchestratorCommand,
) -> bool
where
    T: PlaybackTech + 'static,
{
    match command {
        OrchestratorCommand::Play {
            playable,
            properties,
        } => orchestrator.play(playable, properties).await,

        OrchestratorCommand::Pause => orchestrator.pause(),

        OrchestratorCommand::Resume => orchestrator.resume(),

        OrchestratorCommand::Stop => orchestrator.stop().await,

        OrchestratorCommand::SeekTo { position_ms } => orchestrator.seek_to(position_ms),

        OrchestratorCommand::SeekToTime { unix_ms } => orchestrator.seek_to_time(unix_ms),

        OrchestratorCommand::SetTimeshiftDelay { delay_ms } => {
            orchestrator.set_timeshift_delay(delay_ms)
        }

        OrchestratorCommand::GetTrickPlay { responder } => {
            let _ = responder.send(orchestrator.trick_play());
        }

        OrchestratorCommand::GetSessionInfo { responder } => {
            let _ = responder.send(orchestrator.session_info());
        }

        OrchestratorCommand::GetCurrentProgram { responder } => {
            let _ = responder.send(orchestrator.current_program());
        }

        OrchestratorCommand::Dispose { responder } => {
            tracing::debug!("Playback orchestrator actor shutting down");
            orchestrator.dispose().await;
            // Handles must observe the shutdown once dispose returns.
            receiver.close();
            let _ = responder.send(());
            return false;
        }
    }

    true
}
