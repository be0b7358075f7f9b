//! Where play commands, device lists and current playback come from.

use reqwest::{Client, header::COOKIE};
use serde_json::json;
use thiserror::Error;

use super::command::PlaybackCommand;
use crate::{
    management::{TokenStore, proxy},
    spotify::{ApiError, SpotifyClient},
    types::{CurrentPlayback, Device, ProxyErrorBody},
};

/// A play command that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandFailure {
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },
    #[error("{0}")]
    Network(String),
}

#[allow(async_fn_in_trait)]
pub trait PlaybackBackend {
    /// Sends a play command through the proxy.
    async fn send_command(&self, command: &PlaybackCommand) -> Result<(), CommandFailure>;

    async fn devices(&self, token: &str) -> Result<Vec<Device>, ApiError>;

    async fn current_playback(&self, token: &str) -> Result<Option<CurrentPlayback>, ApiError>;
}

/// Talks to the syftplayer web server for play commands and to Spotify for
/// everything else.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
    session_cookie: Option<String>,
    spotify: SpotifyClient,
}

impl HttpBackend {
    /// `session_cookie` is sent verbatim as the `Cookie` header.
    pub fn new(base_url: &str, session_cookie: Option<String>, spotify: SpotifyClient) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session_cookie,
            spotify,
        }
    }
}

impl PlaybackBackend for HttpBackend {
    async fn send_command(&self, command: &PlaybackCommand) -> Result<(), CommandFailure> {
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, command.kind.path()))
            .json(&json!({ "uri": command.uri, "device_id": command.device_id }));
        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| CommandFailure::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response
            .json::<ProxyErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| format!("Error playing {} ({})", command.kind.noun(), status));
        Err(CommandFailure::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn devices(&self, token: &str) -> Result<Vec<Device>, ApiError> {
        self.spotify.devices(token).await
    }

    async fn current_playback(&self, token: &str) -> Result<Option<CurrentPlayback>, ApiError> {
        self.spotify.current_playback(token).await
    }
}

/// Runs the proxy logic in-process for a stored user, no web server needed.
#[derive(Debug, Clone)]
pub struct DirectBackend {
    spotify: SpotifyClient,
    tokens: TokenStore,
    uid: String,
}

impl DirectBackend {
    pub fn new(spotify: SpotifyClient, tokens: TokenStore, uid: &str) -> Self {
        Self {
            spotify,
            tokens,
            uid: uid.to_string(),
        }
    }
}

impl PlaybackBackend for DirectBackend {
    async fn send_command(&self, command: &PlaybackCommand) -> Result<(), CommandFailure> {
        let token = self
            .tokens
            .fresh_access_token(&self.spotify, &self.uid)
            .await
            .map_err(|e| CommandFailure::Status {
                status: 401,
                message: e.to_string(),
            })?;

        proxy::forward_play(&self.spotify, &token, command)
            .await
            .map_err(|e| CommandFailure::Status {
                status: e.status(),
                message: e.body().error,
            })
    }

    async fn devices(&self, token: &str) -> Result<Vec<Device>, ApiError> {
        self.spotify.devices(token).await
    }

    async fn current_playback(&self, token: &str) -> Result<Option<CurrentPlayback>, ApiError> {
        self.spotify.current_playback(token).await
    }
}
