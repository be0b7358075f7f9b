//! Play command forwarding shared by the web proxy and the CLI.

use thiserror::Error;

use crate::{
    playback::{CommandKind, PlaybackCommand},
    spotify::{ApiError, SpotifyClient},
    types::{DeviceSummary, ProxyErrorBody},
    utils, warning,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProxyError {
    #[error("Not authenticated with Spotify")]
    NotAuthenticated,
    #[error("Missing {} URI or device ID", .0.noun())]
    MissingParams(CommandKind),
    #[error("Device not found")]
    DeviceNotFound { devices: Vec<DeviceSummary> },
    #[error("Track not found")]
    TrackNotFound,
    #[error("Not found")]
    NotFound(&'static str),
    #[error("Authorization failed")]
    Unauthorized,
    #[error("{message}")]
    Upstream { status: u16, message: String },
}

impl ProxyError {
    pub fn status(&self) -> u16 {
        match self {
            ProxyError::NotAuthenticated | ProxyError::Unauthorized => 401,
            ProxyError::MissingParams(_) => 400,
            ProxyError::DeviceNotFound { .. } | ProxyError::TrackNotFound | ProxyError::NotFound(_) => {
                404
            }
            ProxyError::Upstream { status, .. } => *status,
        }
    }

    pub fn body(&self) -> ProxyErrorBody {
        let message = match self {
            ProxyError::DeviceNotFound { .. } => {
                Some("The specified device was not found among your available devices.".to_string())
            }
            ProxyError::TrackNotFound => Some("The specified track could not be found.".to_string()),
            ProxyError::NotFound(what) => Some(format!("The requested {} could not be found.", what)),
            ProxyError::Unauthorized => Some("Your Spotify session may have expired.".to_string()),
            _ => None,
        };
        let devices = match self {
            ProxyError::DeviceNotFound { devices } => Some(devices.clone()),
            _ => None,
        };

        ProxyErrorBody {
            error: self.to_string(),
            message,
            devices,
        }
    }
}

impl From<ApiError> for ProxyError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::NotFound(_) => ProxyError::NotFound("resource"),
            ApiError::Unauthorized(_) => ProxyError::Unauthorized,
            ApiError::Status { status, message } => ProxyError::Upstream { status, message },
            ApiError::Network(e) => ProxyError::Upstream {
                status: 500,
                message: e.to_string(),
            },
        }
    }
}

/// Validates `command` against the account and starts playback.
///
/// The device must be among the user's devices. Tracks are looked up first so
/// a bad URI yields "Track not found" instead of a generic upstream 404; other
/// lookup failures are only logged.
pub async fn forward_play(
    client: &SpotifyClient,
    token: &str,
    command: &PlaybackCommand,
) -> Result<(), ProxyError> {
    if command.uri.trim().is_empty() || command.device_id.trim().is_empty() {
        return Err(ProxyError::MissingParams(command.kind));
    }

    let devices = client.devices(token).await?;
    if !devices
        .iter()
        .any(|d| d.id.as_deref() == Some(command.device_id.as_str()))
    {
        return Err(ProxyError::DeviceNotFound {
            devices: devices
                .into_iter()
                .filter_map(|d| {
                    d.id.map(|id| DeviceSummary {
                        id,
                        name: d.name,
                    })
                })
                .collect(),
        });
    }

    if command.kind == CommandKind::PlayTrack {
        match client
            .track(token, utils::track_id_from_uri(&command.uri))
            .await
        {
            Ok(_) => {}
            Err(ApiError::NotFound(_)) => return Err(ProxyError::TrackNotFound),
            Err(e) => warning!("Track lookup for {} failed: {}", command.uri, e),
        }
    }

    match client
        .play(token, &command.device_id, &command.target())
        .await
    {
        Err(ApiError::NotFound(_)) if command.kind == CommandKind::PlayPlaylist => {
            Err(ProxyError::NotFound("playlist"))
        }
        result => result.map_err(ProxyError::from),
    }
}
