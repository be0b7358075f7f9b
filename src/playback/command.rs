use crate::spotify::PlayTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    PlayTrack,
    PlayPlaylist,
}

impl CommandKind {
    /// Proxy route handling this kind.
    pub fn path(&self) -> &'static str {
        match self {
            CommandKind::PlayTrack => "/play_track",
            CommandKind::PlayPlaylist => "/play_playlist",
        }
    }

    /// Noun used in proxy error messages.
    pub fn noun(&self) -> &'static str {
        match self {
            CommandKind::PlayTrack => "track",
            CommandKind::PlayPlaylist => "playlist",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackCommand {
    pub kind: CommandKind,
    pub uri: String,
    pub device_id: String,
}

impl PlaybackCommand {
    /// `spotify:track:*` plays a single track, anything else is played as a
    /// context.
    pub fn for_uri(uri: &str, device_id: &str) -> Self {
        let kind = if uri.starts_with("spotify:track:") {
            CommandKind::PlayTrack
        } else {
            CommandKind::PlayPlaylist
        };
        Self::new(kind, uri, device_id)
    }

    pub fn new(kind: CommandKind, uri: &str, device_id: &str) -> Self {
        Self {
            kind,
            uri: uri.to_string(),
            device_id: device_id.to_string(),
        }
    }

    pub fn target(&self) -> PlayTarget {
        match self.kind {
            CommandKind::PlayTrack => PlayTarget::Track(self.uri.clone()),
            CommandKind::PlayPlaylist => PlayTarget::Context(self.uri.clone()),
        }
    }
}
