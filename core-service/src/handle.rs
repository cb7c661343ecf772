//! Caller-side handle to a running [`PlayerCore`](crate::PlayerCore).
//!
//! Every method is a request/reply round trip through the control loop, so
//! calls made from one task are applied in the order they were made. Once
//! the loop has stopped every method fails with [`CoreError::Shutdown`].

use crate::command::{Command, PlayerStatus};
use crate::error::{CoreError, Result};
use core_library::PlaylistParser;
use core_metadata::ScanJobId;
use core_runtime::events::{EventBus, EventStream};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CoreHandle {
    commands: mpsc::Sender<Command>,
    events: EventBus,
}

impl CoreHandle {
    pub(crate) fn new(commands: mpsc::Sender<Command>, events: EventBus) -> Self {
        Self { commands, events }
    }

    /// Stream of every player and scan notification published from now on.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns `true` once the control loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    // ========================================================================
    // Playback
    // ========================================================================

    pub async fn load(&self, uri: Option<&str>) -> Result<()> {
        let uri = uri.map(str::to_owned);
        self.request(|reply| Command::Load { uri, reply }).await??;
        Ok(())
    }

    pub async fn set_playing(&self, playing: bool) -> Result<()> {
        self.request(|reply| Command::SetPlaying { playing, reply })
            .await??;
        Ok(())
    }

    pub async fn get_playing(&self) -> Result<bool> {
        self.request(|reply| Command::GetPlaying { reply }).await
    }

    pub async fn seek(&self, position_secs: u64) -> Result<()> {
        self.request(|reply| Command::Seek {
            position_secs,
            reply,
        })
        .await??;
        Ok(())
    }

    pub async fn get_position(&self) -> Result<u64> {
        self.request(|reply| Command::GetPosition { reply }).await
    }

    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        self.request(|reply| Command::SetVolume { volume, reply })
            .await??;
        Ok(())
    }

    pub async fn get_volume(&self) -> Result<f64> {
        self.request(|reply| Command::GetVolume { reply }).await
    }

    pub async fn status(&self) -> Result<PlayerStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    // ========================================================================
    // Scanning
    // ========================================================================

    pub async fn submit(&self, uri: impl Into<String>) -> Result<ScanJobId> {
        let uri = uri.into();
        self.request(|reply| Command::Submit { uri, reply }).await
    }

    pub async fn cancel(&self, id: ScanJobId) -> Result<()> {
        self.request(|reply| Command::Cancel { id, reply }).await??;
        Ok(())
    }

    /// Read an M3U playlist and submit every entry for scanning, in playlist
    /// order. The file is read off the control loop.
    pub async fn scan_playlist(&self, uri: impl Into<String>) -> Result<Vec<ScanJobId>> {
        let uri = uri.into();
        let uris = tokio::task::spawn_blocking(move || {
            PlaylistParser::new()
                .parse(&uri)
                .map(|entries| entries.collect::<Vec<_>>())
        })
        .await
        .map_err(|e| core_runtime::Error::Internal(e.to_string()))??;

        debug!(entries = uris.len(), "Submitting playlist entries");
        if uris.is_empty() {
            return Ok(Vec::new());
        }
        self.request(|reply| Command::SubmitAll { uris, reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| CoreError::Shutdown)?;
        response.await.map_err(|_| CoreError::Shutdown)
    }
}
