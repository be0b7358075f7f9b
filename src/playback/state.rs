use std::fmt;

use chrono::Utc;

use super::events::SdkPlayerState;
use crate::{
    types::{CurrentPlayback, Track},
    utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    ConnectingSdk,
    AwaitingDevice,
    Ready,
    Reconnecting,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::ConnectingSdk => "connecting-sdk",
            ConnectionState::AwaitingDevice => "awaiting-device",
            ConnectionState::Ready => "ready",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Result of [`check_device_status`](super::PlaybackSession::check_device_status).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NowPlayingSource {
    /// Player state pushed by the SDK for this device.
    Sdk,
    /// Current playback polled from the Web API for the whole account.
    Poll,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub track_name: String,
    pub track_uri: String,
    pub artist_names: Vec<String>,
    pub album_name: String,
    pub album_image_url: Option<String>,
    pub duration_ms: u64,
    pub position_ms: u64,
    pub paused: bool,
    pub source: NowPlayingSource,
    /// Unix milliseconds at which the record was applied.
    pub received_at: i64,
}

impl NowPlaying {
    fn from_track(
        track: &Track,
        position_ms: u64,
        paused: bool,
        source: NowPlayingSource,
    ) -> Self {
        let album = track.album.as_ref();
        Self {
            track_name: track.name.clone(),
            track_uri: track.uri.clone(),
            artist_names: track.artists.iter().map(|a| a.name.clone()).collect(),
            album_name: album.map(|a| a.name.clone()).unwrap_or_default(),
            album_image_url: album.and_then(|a| a.images.first()).map(|i| i.url.clone()),
            duration_ms: track.duration_ms,
            position_ms,
            paused,
            source,
            received_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn from_sdk(track: &Track, state: &SdkPlayerState) -> Self {
        let mut now_playing =
            Self::from_track(track, state.position, state.paused, NowPlayingSource::Sdk);
        if state.duration > 0 {
            now_playing.duration_ms = state.duration;
        }
        now_playing
    }

    /// `None` when the playback carries no item (e.g. an ad or a podcast gap).
    pub fn from_poll(playback: &CurrentPlayback) -> Option<Self> {
        playback.item.as_ref().map(|track| {
            Self::from_track(
                track,
                playback.progress_ms.unwrap_or(0),
                !playback.is_playing,
                NowPlayingSource::Poll,
            )
        })
    }

    /// First credited artist. The status line names only this one.
    pub fn primary_artist(&self) -> &str {
        self.artist_names.first().map(String::as_str).unwrap_or("")
    }

    pub fn status_line(&self) -> String {
        status_line(self.paused, &self.track_name, self.primary_artist())
    }
}

pub fn status_line(paused: bool, track_name: &str, artists: &str) -> String {
    format!(
        "{} {} by {}",
        if paused { "Paused:" } else { "Playing:" },
        track_name,
        artists
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowEntry {
    pub uri: String,
    pub name: String,
    pub artist: String,
    pub image_url: Option<String>,
    pub duration: String,
    pub is_current: bool,
}

impl WindowEntry {
    fn new(track: &Track, is_current: bool) -> Self {
        Self {
            uri: track.uri.clone(),
            name: track.name.clone(),
            artist: track
                .artists
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            image_url: track
                .album
                .as_ref()
                .and_then(|a| a.images.last())
                .map(|i| i.url.clone()),
            duration: utils::format_duration(track.duration_ms),
            is_current,
        }
    }
}

/// Adjacent tracks reported with the latest SDK state, in the order the event
/// lists them: previously played, current, upcoming. Replaced on every state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackWindow {
    pub context_name: Option<String>,
    pub entries: Vec<WindowEntry>,
}

impl TrackWindow {
    pub fn from_state(state: &SdkPlayerState) -> Self {
        let window = &state.track_window;
        let entries = window
            .previous_tracks
            .iter()
            .map(|t| WindowEntry::new(t, false))
            .chain(window.current_track.iter().map(|t| WindowEntry::new(t, true)))
            .chain(window.next_tracks.iter().map(|t| WindowEntry::new(t, false)))
            .collect();

        Self {
            context_name: state
                .context
                .as_ref()
                .and_then(|c| c.metadata.as_ref())
                .and_then(|m| m.name.clone())
                .filter(|n| !n.is_empty()),
            entries,
        }
    }

    /// `"<context> - <n> tracks"` when the state named its context.
    pub fn title(&self) -> Option<String> {
        self.context_name
            .as_ref()
            .map(|name| format!("{} - {} tracks", name, self.entries.len()))
    }

    pub fn current(&self) -> Option<&WindowEntry> {
        self.entries.iter().find(|e| e.is_current)
    }
}
