//! # Player Core
//!
//! Owns the playback controller and the scan engine and drives both from a
//! single task.
//!
//! ```text
//!  CoreHandle ──commands──┐
//!  playback bus ──────────┤
//!  probe bus ─────────────┼──> PlayerCore::run ──> EventBus ──> subscribers
//!  tick (while loaded) ───┤
//!  CancellationToken ─────┘
//! ```
//!
//! Neither engine locks. Everything that mutates them (caller commands,
//! engine messages, the position tick) is a branch of one `select!`, so no
//! two handlers ever overlap.

use crate::command::{Command, PlayerStatus};
use crate::error::{CoreError, Result};
use crate::handle::CoreHandle;
use bridge_traits::{BusReceiver, EngineFactory};
use core_metadata::ScanEngine;
use core_playback::{PlaybackController, PlayerConfig};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

pub struct PlayerCore {
    playback: PlaybackController,
    scanner: ScanEngine,
    playback_bus: BusReceiver,
    probe_bus: BusReceiver,
    commands: mpsc::Receiver<Command>,
}

impl PlayerCore {
    /// Build both engines from `factory`.
    ///
    /// A factory that cannot build an engine does not fail construction;
    /// the affected half degrades to no-ops. Only an invalid configuration
    /// is an error.
    pub fn new(config: CoreConfig, factory: &dyn EngineFactory) -> Result<(Self, CoreHandle)> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let (playback, playback_bus) =
            PlaybackController::new(factory, events.clone(), PlayerConfig::from(&config));
        let (scanner, probe_bus) = ScanEngine::new(factory, events.clone());
        let (sender, commands) = mpsc::channel(config.event_buffer_size);

        info!(
            playback_ready = playback.is_ready(),
            scan_ready = scanner.is_ready(),
            tick_interval = ?config.tick_interval,
            "Player core initialized"
        );

        let core = Self {
            playback,
            scanner,
            playback_bus,
            probe_bus,
            commands,
        };

        Ok((core, CoreHandle::new(sender, events)))
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn scanner(&self) -> &ScanEngine {
        &self.scanner
    }

    /// Run the control loop on the current tokio runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> Result<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
        Ok(runtime.spawn(self.run(shutdown)))
    }

    /// Process commands, engine messages and ticks until `shutdown` fires or
    /// every [`CoreHandle`] is dropped, then tear both engines down.
    #[instrument(skip_all, name = "player_core")]
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = time::interval(self.playback.config().tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticking = false;

        info!("Control loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.dispatch(command),
                    None => {
                        info!("All handles dropped");
                        break;
                    }
                },
                Some(message) = self.playback_bus.recv() => self.playback.handle_message(message),
                Some(message) = self.probe_bus.recv() => self.scanner.handle_message(message),
                _ = ticker.tick(), if ticking => self.playback.on_tick(),
            }

            let active = self.playback.tick_active();
            if active && !ticking {
                ticker.reset();
            }
            ticking = active;
        }

        self.shutdown();
    }

    fn dispatch(&mut self, command: Command) {
        debug!(command = command.name(), "Dispatching command");

        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            Command::Load { uri, reply } => {
                let _ = reply.send(self.playback.load(uri.as_deref()));
            }
            Command::SetPlaying { playing, reply } => {
                let _ = reply.send(self.playback.set_playing(playing));
            }
            Command::GetPlaying { reply } => {
                let _ = reply.send(self.playback.get_playing());
            }
            Command::Seek {
                position_secs,
                reply,
            } => {
                let _ = reply.send(self.playback.seek(position_secs));
            }
            Command::GetPosition { reply } => {
                let _ = reply.send(self.playback.get_position());
            }
            Command::SetVolume { volume, reply } => {
                let _ = reply.send(self.playback.set_volume(volume));
            }
            Command::GetVolume { reply } => {
                let _ = reply.send(self.playback.get_volume());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Submit { uri, reply } => {
                let _ = reply.send(self.scanner.submit(uri));
            }
            Command::SubmitAll { uris, reply } => {
                let ids = uris
                    .into_iter()
                    .map(|uri| self.scanner.submit(uri))
                    .collect();
                let _ = reply.send(ids);
            }
            Command::Cancel { id, reply } => {
                let _ = reply.send(self.scanner.cancel(id));
            }
        }
    }

    fn status(&self) -> PlayerStatus {
        PlayerStatus {
            uri: self.playback.uri().map(str::to_owned),
            playing: self.playback.get_playing(),
            position_secs: self.playback.get_position(),
            volume: self.playback.get_volume(),
            can_seek: self.playback.can_seek(),
            duration_secs: self.playback.duration_secs(),
            buffer_percent: self.playback.buffer_percent(),
            pending_scans: self.scanner.pending(),
        }
    }

    fn shutdown(&mut self) {
        self.commands.close();
        self.scanner.shutdown();
        self.playback.shutdown();
        info!("Control loop stopped");
    }
}

impl std::fmt::Debug for PlayerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerCore")
            .field("playback", &self.playback)
            .field("scanner", &self.scanner)
            .finish()
    }
}
