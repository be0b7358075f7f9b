use std::sync::Arc;

use axum::http::{HeaderMap, header::COOKIE};

use crate::{
    config::Settings,
    management::{SESSION_COOKIE, SessionStore, StoreError, TokenStore},
    spotify::SpotifyClient,
    utils,
};

/// Shared state of the web server, handed to every handler as an
/// `Extension`. Cloning is cheap; the stores share their contents.
#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub spotify: SpotifyClient,
    pub tokens: TokenStore,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            spotify: SpotifyClient::new(settings.spotify.clone()),
            tokens: TokenStore::new(settings.data_dir.clone()),
            sessions: SessionStore::new(),
            settings: Arc::new(settings),
        }
    }

    /// Opens a session for an already stored user and returns the cookie
    /// value.
    pub async fn sign_in(&self, uid: &str) -> String {
        self.sessions.create(uid).await
    }

    /// Session cookie value sent with the request, if any.
    pub fn session_id(headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|header| utils::cookie_value(header, SESSION_COOKIE))
            .map(str::to_string)
    }

    /// User id of the signed-in user.
    pub async fn current_user(&self, headers: &HeaderMap) -> Option<String> {
        let session_id = Self::session_id(headers)?;
        self.sessions.user(&session_id).await
    }

    pub async fn fresh_token(&self, uid: &str) -> Result<String, StoreError> {
        self.tokens.fresh_access_token(&self.spotify, uid).await
    }
}
