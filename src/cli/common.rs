use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::{error, management::TokenStore, spotify::SpotifyClient};

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}

/// `user` if given, otherwise whoever logged in last.
pub async fn resolve_user(tokens: &TokenStore, user: Option<String>) -> String {
    if let Some(user) = user {
        return user;
    }
    match tokens.last_user().await {
        Ok(Some(uid)) => uid,
        Ok(None) => error!("Nobody is logged in. Run `syftplayer login` first."),
        Err(e) => error!("Cannot read stored login. Err: {}", e),
    }
}

/// Fresh access token for `uid`; exits when there is none.
pub async fn access_token(tokens: &TokenStore, spotify: &SpotifyClient, uid: &str) -> String {
    match tokens.fresh_access_token(spotify, uid).await {
        Ok(token) => token,
        Err(e) => error!(
            "No usable Spotify token for {}. Run `syftplayer login` again. Err: {}",
            uid, e
        ),
    }
}
