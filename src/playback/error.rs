use thiserror::Error;

/// Everything the playback session can fail with or report on its error
/// signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("No Spotify access token provided")]
    TokenMissing,
    #[error("Spotify Web Playback SDK failed to load")]
    SdkLoadTimeout,
    #[error("Spotify Web Playback SDK is not available")]
    SdkMissing,
    #[error("Spotify player initialization error: {0}")]
    InitializationError(String),
    /// Emits a token expired signal before reconnecting.
    #[error("Spotify player authentication error: {0}")]
    AuthenticationError(String),
    /// Usually a non-premium account. Never retried.
    #[error("Spotify account error: {0}")]
    AccountError(String),
    #[error("Spotify playback error: {0}")]
    Playback(String),
    #[error("No Spotify device available")]
    DeviceUnavailable,
    #[error(
        "The track could not be played. The device may need reconnecting or the track is unavailable."
    )]
    TrackOrDeviceNotFound,
    #[error("Your Spotify session has expired. Please refresh the page.")]
    SessionExpired,
    #[error("{message}")]
    UpstreamError { message: String },
}

impl PlaybackError {
    /// Value of the `type` field of the `spotify:error` signal.
    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackError::TokenMissing => "token_missing",
            PlaybackError::SdkLoadTimeout => "sdk_load",
            PlaybackError::SdkMissing => "sdk_missing",
            PlaybackError::InitializationError(_) => "initialization",
            PlaybackError::AuthenticationError(_) => "authentication",
            PlaybackError::AccountError(_) => "account",
            PlaybackError::Playback(_) => "playback",
            PlaybackError::DeviceUnavailable => "device",
            PlaybackError::TrackOrDeviceNotFound => "not_found",
            PlaybackError::SessionExpired => "session_expired",
            PlaybackError::UpstreamError { .. } => "upstream",
        }
    }

    /// Errors that move the session to `Failed` and need user action.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PlaybackError::SdkLoadTimeout
                | PlaybackError::SdkMissing
                | PlaybackError::InitializationError(_)
                | PlaybackError::AccountError(_)
        )
    }
}

/// Playback error messages that point at a stale device rather than a real
/// playback problem.
const TRANSIENT_PLAYBACK_PATTERNS: &[&str] = &[
    "404",
    "not found",
    "no active device",
    "device_not_found",
    "failed to connect",
];

pub fn is_transient_playback_error(message: &str) -> bool {
    let message = message.to_lowercase();
    TRANSIENT_PLAYBACK_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}
