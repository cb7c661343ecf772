//! Requests sent from [`CoreHandle`](crate::CoreHandle) to the control loop.

use core_metadata::ScanJobId;
use serde::Serialize;
use tokio::sync::oneshot;

type Reply<T> = oneshot::Sender<T>;

/// Point-in-time view of the player, read in one control-loop step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStatus {
    pub uri: Option<String>,
    pub playing: bool,
    pub position_secs: u64,
    pub volume: f64,
    pub can_seek: bool,
    pub duration_secs: Option<u64>,
    pub buffer_percent: u8,
    pub pending_scans: usize,
}

#[derive(Debug)]
pub(crate) enum Command {
    Load {
        uri: Option<String>,
        reply: Reply<core_playback::Result<()>>,
    },
    SetPlaying {
        playing: bool,
        reply: Reply<core_playback::Result<()>>,
    },
    GetPlaying {
        reply: Reply<bool>,
    },
    Seek {
        position_secs: u64,
        reply: Reply<core_playback::Result<()>>,
    },
    GetPosition {
        reply: Reply<u64>,
    },
    SetVolume {
        volume: f64,
        reply: Reply<core_playback::Result<()>>,
    },
    GetVolume {
        reply: Reply<f64>,
    },
    Status {
        reply: Reply<PlayerStatus>,
    },
    Submit {
        uri: String,
        reply: Reply<ScanJobId>,
    },
    SubmitAll {
        uris: Vec<String>,
        reply: Reply<Vec<ScanJobId>>,
    },
    Cancel {
        id: ScanJobId,
        reply: Reply<core_metadata::Result<()>>,
    },
}

impl Command {
    /// Short name used in log output.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::Load { .. } => "load",
            Command::SetPlaying { .. } => "set-playing",
            Command::GetPlaying { .. } => "get-playing",
            Command::Seek { .. } => "seek",
            Command::GetPosition { .. } => "get-position",
            Command::SetVolume { .. } => "set-volume",
            Command::GetVolume { .. } => "get-volume",
            Command::Status { .. } => "status",
            Command::Submit { .. } => "submit",
            Command::SubmitAll { .. } => "submit-all",
            Command::Cancel { .. } => "cancel",
        }
    }
}
