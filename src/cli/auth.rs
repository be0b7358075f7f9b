use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::{
    config::Settings, error, management::TokenStore, server, success, utils, warning,
};

const LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs the web server just long enough to complete a browser login.
pub async fn login(settings: Settings) {
    let tokens = TokenStore::new(settings.data_dir.clone());
    let login_url = format!("{}/login", settings.public_url);
    let started_at = utils::now_secs();

    let server = tokio::spawn(async move {
        if let Err(e) = server::start_api_server(settings).await {
            warning!("Login server stopped. Err: {}", e);
        }
    });

    if webbrowser::open(&login_url).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            login_url
        )
    }

    let uid = wait_for_login(&tokens, started_at).await;
    server.abort();

    match uid {
        Some(uid) => success!("Authentication successful! Logged in as {}", uid),
        None => error!("Authentication failed or timed out."),
    }
}

/// Polls the token store until a login newer than `started_at` shows up.
async fn wait_for_login(tokens: &TokenStore, started_at: u64) -> Option<String> {
    let deadline = Instant::now() + LOGIN_TIMEOUT;
    while Instant::now() < deadline {
        if let Ok(Some(uid)) = tokens.last_user().await {
            if let Ok(record) = tokens.load(&uid).await {
                if record.updated_at >= started_at {
                    return Some(uid);
                }
            }
        }
        sleep(Duration::from_millis(500)).await;
    }
    None
}
