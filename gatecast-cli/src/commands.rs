//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::DateTime;
use clap::Subcommand;
use gatecast_core::config::GatecastConfig;
use gatecast_core::events::{EventSubscription, PlaybackEvent};
use gatecast_core::model::{Playable, PlaybackProperties, Program, StartPolicy};
use gatecast_core::offline::JsonGrantStore;
use gatecast_core::orchestrator::{PlayerHandle, spawn_orchestrator};
use gatecast_core::traits::Clock;
use gatecast_sim::{SimulationEnvironment, TechMonitor};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Play a linear channel
    Channel {
        channel_id: String,
        #[command(flatten)]
        options: PlayOptions,
        /// Apply a timeshift delay once playback has started
        #[arg(long)]
        timeshift_secs: Option<u64>,
    },
    /// Play a program of a channel (the one on air when no id is given)
    Program {
        channel_id: String,
        program_id: Option<String>,
        /// Scheduled start, unix milliseconds
        #[arg(long, requires = "end_ms")]
        start_ms: Option<i64>,
        /// Scheduled end, unix milliseconds
        #[arg(long, requires = "start_ms")]
        end_ms: Option<i64>,
        #[command(flatten)]
        options: PlayOptions,
    },
    /// Play an on-demand asset
    Asset {
        asset_id: String,
        #[command(flatten)]
        options: PlayOptions,
    },
    /// Play a downloaded asset using the grant stored beside its manifest
    Offline {
        manifest: PathBuf,
        /// Fetch a grant for this asset and store it before playing
        #[arg(long)]
        download: Option<String>,
        #[command(flatten)]
        options: PlayOptions,
    },
}

/// Options shared by every play command
#[derive(clap::Args)]
pub struct PlayOptions {
    /// Start policy: beginning, live-edge, bookmark or a unix time in ms
    #[arg(long)]
    start: Option<StartPolicy>,
    /// Load without starting playback
    #[arg(long)]
    no_autoplay: bool,
}

impl PlayOptions {
    fn properties(&self) -> PlaybackProperties {
        let properties = PlaybackProperties::default().with_autoplay(!self.no_autoplay);
        match self.start {
            Some(policy) => properties.with_start_policy(policy),
            None => properties,
        }
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns an error if the simulation cannot be assembled, the offline grant
/// cannot be prepared, or the player stops responding
pub async fn handle_command(command: Commands, watch_secs: u64) -> anyhow::Result<()> {
    let mut config = GatecastConfig::from_env();
    config.simulation.enabled = true;
    if config.revalidation.tick_interval > Duration::from_secs(1) {
        config.revalidation.tick_interval =
            GatecastConfig::for_development().revalidation.tick_interval;
    }

    let environment = SimulationEnvironment::new(&config)?;
    let grant_store = JsonGrantStore::new(&config.offline);
    let collaborators = environment.collaborators(Arc::new(grant_store.clone()));

    let (playable, properties, timeshift) = match command {
        Commands::Channel {
            channel_id,
            options,
            timeshift_secs,
        } => (
            Playable::channel(channel_id),
            options.properties(),
            timeshift_secs.map(Duration::from_secs),
        ),
        Commands::Program {
            channel_id,
            program_id,
            start_ms,
            end_ms,
            options,
        } => {
            let program = match program_id {
                Some(program_id) => scheduled_program(channel_id, program_id, start_ms, end_ms)?,
                None => environment
                    .epg()
                    .program_at(&channel_id, environment.clock().now())
                    .with_context(|| format!("No program on air for {channel_id}"))?,
            };
            println!("Program: {program}");
            (Playable::Program(program), options.properties(), None)
        }
        Commands::Asset { asset_id, options } => {
            (Playable::asset(asset_id), options.properties(), None)
        }
        Commands::Offline {
            manifest,
            download,
            options,
        } => {
            if let Some(asset_id) = download {
                let grant = collaborators
                    .gateway
                    .play_vod(&asset_id)
                    .await
                    .with_context(|| format!("Failed to download grant for {asset_id}"))?;
                if let Some(parent) = manifest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let path = grant_store.store_grant(&manifest, &grant)?;
                println!("Stored grant for {asset_id} at {}", path.display());
            }
            (Playable::offline(manifest), options.properties(), None)
        }
    };

    let tech = environment.tech();
    let monitor = tech.monitor();
    let player = spawn_orchestrator(config, collaborators, tech);
    let subscription = player.subscribe();

    println!("Playing {playable}");
    player.play(playable, properties).await?;

    watch(&player, subscription, &monitor, timeshift, watch_secs).await?;

    player.dispose().await?;
    println!("Player disposed");
    Ok(())
}

fn scheduled_program(
    channel_id: String,
    program_id: String,
    start_ms: Option<i64>,
    end_ms: Option<i64>,
) -> anyhow::Result<Program> {
    let program = Program::new(channel_id, program_id);
    let (Some(start_ms), Some(end_ms)) = (start_ms, end_ms) else {
        return Ok(program);
    };
    let (Some(start), Some(end)) = (
        DateTime::from_timestamp_millis(start_ms),
        DateTime::from_timestamp_millis(end_ms),
    ) else {
        bail!("Schedule out of range: {start_ms}..{end_ms}");
    };
    if end <= start {
        bail!("Program must end after it starts");
    }
    Ok(program.with_schedule(start, end))
}

/// Prints events and once-a-second tech snapshots until `watch_secs` elapse.
async fn watch(
    player: &PlayerHandle,
    mut subscription: EventSubscription,
    monitor: &TechMonitor,
    mut timeshift: Option<Duration>,
    watch_secs: u64,
) -> anyhow::Result<()> {
    let deadline = tokio::time::sleep(Duration::from_secs(watch_secs));
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            () = &mut deadline => return Ok(()),
            event = subscription.recv() => {
                let Some(event) = event else {
                    return Ok(());
                };
                print_event(&event);
                if matches!(event, PlaybackEvent::Play) {
                    if let Some(delay) = timeshift.take() {
                        println!("Requesting timeshift of {}s", delay.as_secs());
                        player.set_timeshift_delay(delay).await?;
                    }
                }
            }
            _ = ticker.tick() => {
                let snapshot = monitor.snapshot();
                println!(
                    "  tech {:?} media={} position={} bitrate={} delay={}ms",
                    snapshot.state,
                    snapshot.media_id.as_deref().unwrap_or("-"),
                    snapshot
                        .position_ms
                        .map_or_else(|| "-".to_string(), |ms| format!("{ms}ms")),
                    snapshot
                        .bitrate
                        .map_or_else(|| "-".to_string(), |bps| format!("{}kbps", bps / 1000)),
                    snapshot.timeshift_delay_ms
                );
            }
        }
    }
}

fn print_event(event: &PlaybackEvent) {
    match event {
        PlaybackEvent::EntitlementLoadStart { kind } => {
            println!("[{}] {kind}", event.name());
        }
        PlaybackEvent::EntitlementGranted { session_id } => {
            println!("[{}] session {session_id}", event.name());
        }
        PlaybackEvent::StartDegraded { fallback } => {
            println!("[{}] {fallback}", event.name());
        }
        PlaybackEvent::Loaded { session_id, start } => {
            println!("[{}] session {session_id} starting at {start:?}", event.name());
        }
        PlaybackEvent::ProgramChanged(program) => {
            println!("[{}] {program}", event.name());
        }
        PlaybackEvent::Error(error) if error.is_user_error() => {
            println!("[{}] rejected request: {error}", event.name());
        }
        PlaybackEvent::Error(error) => {
            println!("[{}] {} {error}", event.name(), error.code());
        }
        _ => println!("[{}]", event.name()),
    }
}
