use reqwest::{StatusCode, header::CONTENT_LENGTH};
use serde_json::{Value, json};

use super::{ApiError, SpotifyClient};
use crate::types::{CurrentPlayback, Device, DevicesResponse, Track};

/// What a play request starts: a single track or a context (playlist, album,
/// artist).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayTarget {
    Track(String),
    Context(String),
}

impl PlayTarget {
    pub fn body(&self) -> Value {
        match self {
            PlayTarget::Track(uri) => json!({ "uris": [uri] }),
            PlayTarget::Context(uri) => json!({ "context_uri": uri }),
        }
    }
}

impl SpotifyClient {
    pub async fn devices(&self, token: &str) -> Result<Vec<Device>, ApiError> {
        let request = self
            .http()
            .get(self.api("/me/player/devices"))
            .bearer_auth(token);
        let response = self.execute(request).await?;
        Ok(response.json::<DevicesResponse>().await?.devices)
    }

    pub async fn track(&self, token: &str, track_id: &str) -> Result<Track, ApiError> {
        let request = self
            .http()
            .get(self.api(&format!("/tracks/{}", track_id)))
            .bearer_auth(token);
        Ok(self.execute(request).await?.json().await?)
    }

    /// `PUT /me/player/play` on `device_id`.
    pub async fn play(
        &self,
        token: &str,
        device_id: &str,
        target: &PlayTarget,
    ) -> Result<(), ApiError> {
        let request = self
            .http()
            .put(self.api("/me/player/play"))
            .query(&[("device_id", device_id)])
            .bearer_auth(token)
            .json(&target.body());
        self.execute(request).await.map(|_| ())
    }

    /// Resumes whatever was last playing on `device_id`.
    pub async fn resume(&self, token: &str, device_id: &str) -> Result<(), ApiError> {
        self.transport(reqwest::Method::PUT, "/me/player/play", token, device_id)
            .await
    }

    pub async fn pause(&self, token: &str, device_id: &str) -> Result<(), ApiError> {
        self.transport(reqwest::Method::PUT, "/me/player/pause", token, device_id)
            .await
    }

    pub async fn next_track(&self, token: &str, device_id: &str) -> Result<(), ApiError> {
        self.transport(reqwest::Method::POST, "/me/player/next", token, device_id)
            .await
    }

    pub async fn previous_track(&self, token: &str, device_id: &str) -> Result<(), ApiError> {
        self.transport(reqwest::Method::POST, "/me/player/previous", token, device_id)
            .await
    }

    /// What the account is playing anywhere. `None` on `204 No Content`.
    pub async fn current_playback(&self, token: &str) -> Result<Option<CurrentPlayback>, ApiError> {
        let request = self.http().get(self.api("/me/player")).bearer_auth(token);
        let response = self.execute(request).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text).map(Some).map_err(|e| ApiError::Status {
            status: 502,
            message: format!("Malformed playback state: {}", e),
        })
    }

    async fn transport(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &str,
        device_id: &str,
    ) -> Result<(), ApiError> {
        let request = self
            .http()
            .request(method, self.api(path))
            .query(&[("device_id", device_id)])
            .header(CONTENT_LENGTH, "0")
            .bearer_auth(token);
        self.execute(request).await.map(|_| ())
    }
}
