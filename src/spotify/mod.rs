//! # Spotify Integration Module
//!
//! Thin client for the two Spotify services syftplayer consumes:
//!
//! ```text
//! Web server / CLI / playback session
//!          ↓
//! SpotifyClient
//!     ├── auth       (authorize URL, code exchange, refresh, profile)
//!     ├── player     (devices, play, transport, current playback, tracks)
//!     ├── search     (track search)
//!     └── playlists  (current user's playlists)
//!          ↓
//! reqwest → accounts.spotify.com / api.spotify.com
//! ```
//!
//! Every call goes through [`SpotifyClient::execute`], which waits out a
//! `429 Too Many Requests` once when the `Retry-After` delay is reasonable and
//! classifies every non-2xx answer into an [`ApiError`]. Callers decide what a
//! 401 or a 404 means for them; the proxy turns them into HTTP statuses and
//! the playback session turns them into reconnects or token refresh requests.

pub mod auth;
pub mod player;
pub mod playlists;
pub mod search;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tokio::time::sleep;

use crate::{config::SpotifyConfig, types::ApiErrorBody, warning};

pub use player::PlayTarget;

/// Longest `Retry-After` delay (seconds) that is waited out automatically.
const MAX_RETRY_AFTER_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    /// HTTP status of the upstream answer, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::NotFound(_) => Some(404),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
        }
    }

    /// Upstream message without the status decoration.
    pub fn message(&self) -> String {
        match self {
            ApiError::Unauthorized(m) | ApiError::NotFound(m) => m.clone(),
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Network(e) => e.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: Client,
    config: SpotifyConfig,
}

impl SpotifyClient {
    pub fn new(config: SpotifyConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &SpotifyConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn api(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    /// Sends `request`, retrying once after a tolerable `Retry-After`.
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let retry = request.try_clone();
        let response = request.send().await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);

            match retry {
                Some(retry) if retry_after <= MAX_RETRY_AFTER_SECS => {
                    sleep(Duration::from_secs(retry_after)).await;
                    return check(retry.send().await?).await;
                }
                _ => warning!(
                    "Spotify asked to retry after {} seconds, giving up on this request",
                    retry_after
                ),
            }
        }

        check(response).await
    }
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|body| body.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    Err(match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    })
}
