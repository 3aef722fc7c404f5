//! Background program-boundary revalidation for live and catch-up sessions.
//!
//! A session on a channel keeps one `RevalidationLoop` running. On every tick
//! it asks the orchestrator where the playhead is, looks up the program
//! airing at that time and, when a new program has started, re-entitles for
//! it. The loop never touches session state: it reports through
//! `SessionCompletion`s tagged with the token of the session that spawned it.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::commands::SessionCompletion;
use super::session::SessionToken;
use crate::errors::PlaybackError;
use crate::model::{Grant, Program};
use crate::traits::{EntitlementGateway, MetadataLookup};

/// Finds the program airing at a time and entitles the user for it.
///
/// Shared by the revalidation loop and timeshift changes.
#[derive(Clone)]
pub(crate) struct EntitlementChecker {
    gateway: Arc<dyn EntitlementGateway>,
    metadata: Arc<dyn MetadataLookup>,
    epg_window: Duration,
}

impl EntitlementChecker {
    pub(crate) fn new(
        gateway: Arc<dyn EntitlementGateway>,
        metadata: Arc<dyn MetadataLookup>,
        epg_window: Duration,
    ) -> Self {
        Self {
            gateway,
            metadata,
            epg_window,
        }
    }

    /// Program on `channel_id` covering `at`.
    ///
    /// # Errors
    /// - `PlaybackError::GenericPlaybackFailure` - EPG lookup failed
    /// - `PlaybackError::ProgramNotFound` - Nothing airs at `at`
    pub(crate) async fn program_at(
        &self,
        channel_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Program, PlaybackError> {
        let programs = self.metadata.epg_at(channel_id, at, self.epg_window).await?;
        programs
            .into_iter()
            .find(|program| program.covers(at))
            .ok_or_else(|| PlaybackError::ProgramNotFound {
                channel_id: channel_id.to_string(),
                unix_ms: at.timestamp_millis(),
            })
    }

    /// # Errors
    /// - `PlaybackError::EntitlementFailed` - Gateway refused the program
    pub(crate) async fn entitle(&self, program: &Program) -> Result<Grant, PlaybackError> {
        let grant = self
            .gateway
            .play_catchup(&program.channel_id, &program.program_id)
            .await?;
        Ok(grant)
    }

    /// Looks up the program at `at` and verifies the user may watch it.
    ///
    /// # Errors
    /// Any error of `program_at` or `entitle`.
    pub(crate) async fn check_at(
        &self,
        channel_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(Program, Grant), PlaybackError> {
        let program = self.program_at(channel_id, at).await?;
        let grant = self.entitle(&program).await?;
        Ok((program, grant))
    }
}

/// Owner side of a running revalidation loop.
///
/// Dropping the handle also ends the loop, but only `cancel` guarantees it
/// has finished before returning.
pub struct RevalidationHandle {
    shutdown_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl RevalidationHandle {
    /// Signals the loop and waits until it has exited.
    ///
    /// No completion is sent by the loop once this returns.
    pub async fn cancel(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.join.await {
            if e.is_panic() {
                tracing::error!("Revalidation loop panicked: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

pub(crate) struct RevalidationLoop {
    token: SessionToken,
    channel_id: String,
    current: Option<Program>,
    checker: EntitlementChecker,
    tick_interval: Duration,
    completions: mpsc::UnboundedSender<SessionCompletion>,
}

impl RevalidationLoop {
    pub(crate) fn new(
        token: SessionToken,
        channel_id: String,
        current: Option<Program>,
        checker: EntitlementChecker,
        tick_interval: Duration,
        completions: mpsc::UnboundedSender<SessionCompletion>,
    ) -> Self {
        Self {
            token,
            channel_id,
            current,
            checker,
            tick_interval,
            completions,
        }
    }

    pub(crate) fn spawn(self) -> RevalidationHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(self.run(shutdown_rx));
        RevalidationHandle { shutdown_tx, join }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        tracing::debug!(
            "Revalidation loop started for session {} on channel {}",
            self.token,
            self.channel_id
        );

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            // Work in flight is abandoned as soon as shutdown is signalled.
            let flow = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                flow = self.tick() => flow,
            };
            if flow.is_break() {
                break;
            }
        }

        tracing::debug!("Revalidation loop for session {} stopped", self.token);
    }

    async fn tick(&mut self) -> ControlFlow<()> {
        let Some(reference) = self.reference_time().await else {
            tracing::trace!("No playhead time for session {}, skipping tick", self.token);
            return ControlFlow::Continue(());
        };

        if self
            .current
            .as_ref()
            .is_some_and(|program| program.covers(reference))
        {
            return ControlFlow::Continue(());
        }

        let program = match self.checker.program_at(&self.channel_id, reference).await {
            Ok(program) => program,
            Err(e) => {
                tracing::warn!(
                    "Program lookup on channel {} failed during revalidation: {}",
                    self.channel_id,
                    e
                );
                return ControlFlow::Continue(());
            }
        };

        // Same program with a freshly known schedule.
        if self
            .current
            .as_ref()
            .is_some_and(|current| current.program_id == program.program_id)
        {
            self.current = Some(program);
            return ControlFlow::Continue(());
        }

        match self.checker.entitle(&program).await {
            Ok(grant) => {
                tracing::info!(
                    "Session {} crossed into program {}",
                    self.token,
                    program
                );
                self.current = Some(program.clone());
                self.report(SessionCompletion::ProgramBoundary {
                    token: self.token,
                    program,
                    grant,
                })
            }
            Err(error) => {
                tracing::warn!(
                    "Re-entitlement for program {} failed: {}",
                    program,
                    error
                );
                let _ = self.report(SessionCompletion::RevalidationFailed {
                    token: self.token,
                    error,
                });
                ControlFlow::Break(())
            }
        }
    }

    /// Wall-clock time at the playhead, as reported by the orchestrator.
    async fn reference_time(&self) -> Option<DateTime<Utc>> {
        let (responder, response) = oneshot::channel();
        self.completions
            .send(SessionCompletion::PlayheadProbe {
                token: self.token,
                responder,
            })
            .ok()?;
        let unix_ms = response.await.ok()??;
        DateTime::from_timestamp_millis(unix_ms)
    }

    fn report(&self, completion: SessionCompletion) -> ControlFlow<()> {
        match self.completions.send(completion) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        }
    }
}
