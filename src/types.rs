use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Unknown,
    Playing,
    Paused,
    Stopped,
}

impl PlaybackState {
    /// Map the value of a `state:` status line.
    pub fn from_status(value: &str) -> Self {
        match value.trim() {
            "play" => PlaybackState::Playing,
            "pause" => PlaybackState::Paused,
            "stop" => PlaybackState::Stopped,
            _ => PlaybackState::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// The request currently awaiting a reply from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandState {
    #[default]
    None,
    /// Waiting for the server greeting.
    Connect,
    Authenticate,
    RequestStatus,
    /// Long-poll; never supervised by the command timeout.
    Idle,
    LeavingIdle,
    Play,
    Pause,
}

impl CommandState {
    pub fn label(self) -> &'static str {
        match self {
            CommandState::None => "unknown",
            CommandState::Connect => "new connection",
            CommandState::Authenticate => "password command",
            CommandState::RequestStatus => "status command",
            CommandState::Idle => "idle command",
            CommandState::LeavingIdle => "noidle command",
            CommandState::Play => "play command",
            CommandState::Pause => "pause command",
        }
    }
}

/// Something the user or a server notification wants done once the
/// pipeline is free.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    RequestStatus,
    Play,
    Pause,
}

/// Mirror of the external indicator (the scroll-lock light).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToggleState {
    #[default]
    Unknown,
    Engaged,
    Disengaged,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusReport {
    pub connection: ConnectionState,
    pub playback: PlaybackState,
    pub message: String,
}
