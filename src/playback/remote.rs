use tokio::sync::mpsc;

use super::{
    events::SdkEvent,
    sdk::{PlayerSdk, Transport},
};
use crate::{
    info,
    spotify::{ApiError, SpotifyClient},
};

/// A [`PlayerSdk`] that adopts an existing Spotify Connect device through the
/// Web API instead of hosting a player.
///
/// `connect` looks the device up by name and reports `ready` (or an
/// initialization error) on the event channel, the same way the browser SDK
/// reports through its listeners.
pub struct RemoteDeviceSdk {
    spotify: SpotifyClient,
    device_name: String,
    events: mpsc::UnboundedSender<SdkEvent>,
    token: Option<String>,
    device_id: Option<String>,
}

impl RemoteDeviceSdk {
    pub fn new(
        spotify: SpotifyClient,
        device_name: &str,
        events: mpsc::UnboundedSender<SdkEvent>,
    ) -> Self {
        Self {
            spotify,
            device_name: device_name.to_string(),
            events,
            token: None,
            device_id: None,
        }
    }

    fn send(&self, event: SdkEvent) {
        // The receiver is gone only once the session stopped.
        let _ = self.events.send(event);
    }
}

impl PlayerSdk for RemoteDeviceSdk {
    fn is_loaded(&self) -> bool {
        true
    }

    async fn connect(&mut self, token: &str, player_name: &str) -> Result<bool, String> {
        self.token = Some(token.to_string());

        let devices = match self.spotify.devices(token).await {
            Ok(devices) => devices,
            Err(ApiError::Unauthorized(message)) => {
                self.send(SdkEvent::AuthenticationError { message });
                return Ok(true);
            }
            Err(e) => return Err(e.to_string()),
        };

        let wanted = self.device_name.to_lowercase();
        let found = devices
            .into_iter()
            .find(|d| d.name.to_lowercase() == wanted)
            .and_then(|d| d.id);

        match found {
            Some(device_id) => {
                info!(
                    "{} adopting device {} ({})",
                    player_name, self.device_name, device_id
                );
                self.device_id = Some(device_id.clone());
                self.send(SdkEvent::Ready { device_id });
            }
            None => self.send(SdkEvent::InitializationError {
                message: format!("No Spotify device named '{}'", self.device_name),
            }),
        }
        Ok(true)
    }

    async fn disconnect(&mut self) {
        self.device_id = None;
    }

    async fn transport(&mut self, action: Transport) -> Result<(), String> {
        let (Some(token), Some(device_id)) = (self.token.as_deref(), self.device_id.as_deref())
        else {
            return Err("No connected device".to_string());
        };

        let result = match action {
            Transport::Resume => self.spotify.resume(token, device_id).await,
            Transport::Pause => self.spotify.pause(token, device_id).await,
            Transport::PreviousTrack => self.spotify.previous_track(token, device_id).await,
            Transport::NextTrack => self.spotify.next_track(token, device_id).await,
        };

        match result {
            Ok(()) => Ok(()),
            Err(ApiError::Unauthorized(message)) => {
                self.send(SdkEvent::AuthenticationError {
                    message: message.clone(),
                });
                Err(message)
            }
            Err(ApiError::NotFound(message)) => {
                self.send(SdkEvent::PlaybackError {
                    message: format!("Device not found: {}", message),
                });
                Err(message)
            }
            Err(e) => Err(e.to_string()),
        }
    }
}
