use reqwest::Url;
use serde::Deserialize;

use super::{ApiError, SpotifyClient};
use crate::{
    types::{SpotifyProfile, Token},
    utils,
};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

impl TokenResponse {
    /// Converts the response, keeping `previous_refresh` when Spotify did not
    /// rotate the refresh token.
    fn into_token(self, previous_refresh: Option<&str>) -> Token {
        Token {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string))
                .unwrap_or_default(),
            scope: self.scope.unwrap_or_default(),
            expires_in: self.expires_in,
            obtained_at: utils::now_secs(),
        }
    }
}

impl SpotifyClient {
    /// Builds the accounts authorize URL for a PKCE (S256) login.
    pub fn authorize_url(&self, state: &str, code_challenge: &str) -> Result<String, String> {
        let config = self.config();
        Url::parse_with_params(
            &config.auth_url,
            &[
                ("client_id", config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", config.redirect_uri.as_str()),
                ("code_challenge_method", "S256"),
                ("code_challenge", code_challenge),
                ("scope", config.scope.as_str()),
                ("state", state),
            ],
        )
        .map(|url| url.to_string())
        .map_err(|e| format!("Invalid authorize URL {}: {}", config.auth_url, e))
    }

    /// Exchanges the authorization code from the OAuth callback for a token.
    pub async fn exchange_code_pkce(&self, code: &str, verifier: &str) -> Result<Token, ApiError> {
        let config = self.config();
        let request = self.token_request().form(&[
            ("grant_type", "authorization_code"),
            ("client_id", config.client_id.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", config.redirect_uri.as_str()),
        ]);

        let response = self.execute(request).await?;
        Ok(response.json::<TokenResponse>().await?.into_token(None))
    }

    /// Trades a refresh token for a fresh access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Token, ApiError> {
        let request = self.token_request().form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config().client_id.as_str()),
        ]);

        let response = self.execute(request).await?;
        Ok(response
            .json::<TokenResponse>()
            .await?
            .into_token(Some(refresh_token)))
    }

    /// Profile of the user owning `token`; its `id` is the user identifier.
    pub async fn current_user(&self, token: &str) -> Result<SpotifyProfile, ApiError> {
        let request = self.http().get(self.api("/me")).bearer_auth(token);
        Ok(self.execute(request).await?.json().await?)
    }

    fn token_request(&self) -> reqwest::RequestBuilder {
        let config = self.config();
        let request = self.http().post(&config.token_url);
        match &config.client_secret {
            Some(secret) => request.basic_auth(&config.client_id, Some(secret)),
            None => request,
        }
    }
}
