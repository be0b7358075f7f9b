//! Configuration management for syftplayer.
//!
//! Values come from environment variables and a `.env` file kept in the local
//! data directory. Lookup order:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in `<data_local_dir>/syftplayer/`
//! 3. Application defaults (every key except the Spotify client id)
//!
//! The free functions read a single key each. [`Settings::from_env`] gathers
//! all of them into the typed settings the server, the CLI and the playback
//! session are built from.

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::{playback::ReconnectPolicy, warning};

const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:3000";
const DEFAULT_SCOPE: &str = "user-read-email user-read-private user-read-playback-state user-modify-playback-state streaming user-library-read user-read-currently-playing playlist-read-private";
const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_PLAYER_NAME: &str = "Syft Listening Player";

/// Loads environment variables from `<data_local_dir>/syftplayer/.env`.
///
/// Creates the directory when it is missing. A missing `.env` file is not an
/// error: every key can also come from the process environment.
///
/// # Errors
///
/// Returns an error string if the directory cannot be created or the `.env`
/// file exists but cannot be parsed.
pub async fn load_env() -> Result<(), String> {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("syftplayer/.env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if async_fs::metadata(&path).await.is_ok() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn var_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    var_opt(key).unwrap_or_else(|| default.to_string())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match var_opt(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warning!("Ignoring invalid value '{}' for {}", raw, key);
            default
        }),
        None => default,
    }
}

/// Address the web server binds to, e.g. `127.0.0.1:3000`.
pub fn server_addr() -> String {
    var_or("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS)
}

/// Externally reachable base URL of the web server. Defaults to
/// `http://{SERVER_ADDRESS}`.
pub fn public_url() -> String {
    var_opt("PUBLIC_URL")
        .unwrap_or_else(|| format!("http://{}", server_addr()))
        .trim_end_matches('/')
        .to_string()
}

/// Spotify application client id.
///
/// # Errors
///
/// Fails when `SPOTIFY_API_AUTH_CLIENT_ID` is not set.
pub fn spotify_client_id() -> Result<String, String> {
    var_opt("SPOTIFY_API_AUTH_CLIENT_ID")
        .ok_or_else(|| "SPOTIFY_API_AUTH_CLIENT_ID must be set".to_string())
}

/// Optional client secret, sent as basic auth on token requests.
pub fn spotify_client_secret() -> Option<String> {
    var_opt("SPOTIFY_API_AUTH_CLIENT_SECRET")
}

/// OAuth redirect URI registered with Spotify.
pub fn spotify_redirect_uri() -> String {
    var_opt("SPOTIFY_API_REDIRECT_URI")
        .unwrap_or_else(|| format!("{}/auth/spotify/callback", public_url()))
}

/// Space separated OAuth scopes.
pub fn spotify_scope() -> String {
    var_or("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE)
}

/// Spotify accounts authorize endpoint.
pub fn spotify_apiauth_url() -> String {
    var_or("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL)
}

/// Spotify Web API base URL.
pub fn spotify_apiurl() -> String {
    var_or("SPOTIFY_API_URL", DEFAULT_API_URL)
        .trim_end_matches('/')
        .to_string()
}

/// Spotify accounts token endpoint.
pub fn spotify_apitoken_url() -> String {
    var_or("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL)
}

/// Directory holding user token records and the device cache.
pub fn data_dir() -> PathBuf {
    match var_opt("SYFT_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push("syftplayer");
            path
        }
    }
}

/// Everything needed to talk to the Spotify accounts service and Web API.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
}

/// Settings for the playback session controller.
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    /// Name the player registers under.
    pub name: String,
    /// How long to wait for the SDK to signal it is loaded.
    pub sdk_load_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_PLAYER_NAME.to_string(),
            sdk_load_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_addr: String,
    pub public_url: String,
    pub spotify: SpotifyConfig,
    pub data_dir: PathBuf,
    /// Only playlists whose name starts with this prefix are listed.
    pub playlist_prefix: String,
    pub search_market: String,
    pub search_limit: u32,
    pub player: PlayerSettings,
}

impl Settings {
    /// Builds the settings from the environment.
    ///
    /// # Errors
    ///
    /// Fails when a required key (the client id) is missing.
    pub fn from_env() -> Result<Self, String> {
        let defaults = PlayerSettings::default();
        let reconnect = ReconnectPolicy {
            base: Duration::from_millis(parse_or(
                "SYFT_RECONNECT_BACKOFF_MS",
                defaults.reconnect.base.as_millis() as u64,
            )),
            max: Duration::from_millis(parse_or(
                "SYFT_RECONNECT_MAX_BACKOFF_MS",
                defaults.reconnect.max.as_millis() as u64,
            )),
            factor: defaults.reconnect.factor,
            max_attempts: parse_or(
                "SYFT_RECONNECT_MAX_ATTEMPTS",
                defaults.reconnect.max_attempts,
            ),
        };

        Ok(Self {
            server_addr: server_addr(),
            public_url: public_url(),
            spotify: SpotifyConfig {
                client_id: spotify_client_id()?,
                client_secret: spotify_client_secret(),
                redirect_uri: spotify_redirect_uri(),
                scope: spotify_scope(),
                auth_url: spotify_apiauth_url(),
                token_url: spotify_apitoken_url(),
                api_url: spotify_apiurl(),
            },
            data_dir: data_dir(),
            playlist_prefix: var_or("SYFT_PLAYLIST_PREFIX", "K:"),
            search_market: var_or("SYFT_SEARCH_MARKET", "US"),
            search_limit: parse_or("SYFT_SEARCH_LIMIT", 10),
            player: PlayerSettings {
                name: var_or("SYFT_PLAYER_NAME", DEFAULT_PLAYER_NAME),
                sdk_load_timeout: Duration::from_millis(parse_or(
                    "SYFT_SDK_LOAD_TIMEOUT_MS",
                    defaults.sdk_load_timeout.as_millis() as u64,
                )),
                reconnect,
            },
        })
    }
}
