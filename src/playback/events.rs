use serde::Deserialize;

use super::{
    error::PlaybackError,
    state::{ConnectionState, NowPlaying, TrackWindow},
};
use crate::types::Track;

/// Everything the player SDK reports, one variant per listener.
#[derive(Debug, Clone, PartialEq)]
pub enum SdkEvent {
    /// The SDK script finished loading.
    SdkLoaded,
    Ready { device_id: String },
    NotReady { device_id: String },
    InitializationError { message: String },
    AuthenticationError { message: String },
    AccountError { message: String },
    PlaybackError { message: String },
    /// `None` when playback moved away from this device.
    PlayerStateChanged(Option<SdkPlayerState>),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SdkContextMetadata {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SdkContext {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub metadata: Option<SdkContextMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SdkTrackWindow {
    #[serde(default)]
    pub current_track: Option<Track>,
    #[serde(default)]
    pub previous_tracks: Vec<Track>,
    #[serde(default)]
    pub next_tracks: Vec<Track>,
}

/// The `player_state_changed` payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SdkPlayerState {
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub track_window: SdkTrackWindow,
    #[serde(default)]
    pub context: Option<SdkContext>,
}

/// What the session publishes to the rest of the shell.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    SdkReady,
    Ready { device_id: String },
    NotReady { device_id: String },
    Error(PlaybackError),
    PlayerStateChanged(TrackWindow),
    TrackChanged(NowPlaying),
    TokenExpired,
    StateChanged(ConnectionState),
}

impl SessionSignal {
    /// Name of the matching DOM event.
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionSignal::SdkReady => "spotify:sdk:ready",
            SessionSignal::Ready { .. } => "spotify:ready",
            SessionSignal::NotReady { .. } => "spotify:notReady",
            SessionSignal::Error(_) => "spotify:error",
            SessionSignal::PlayerStateChanged(_) => "spotify:playerStateChanged",
            SessionSignal::TrackChanged(_) => "spotify:trackChanged",
            SessionSignal::TokenExpired => "spotify:tokenExpired",
            SessionSignal::StateChanged(_) => "spotify:stateChanged",
        }
    }
}
