use axum::{
    Extension, Router,
    routing::{get, post},
};
use std::{net::SocketAddr, str::FromStr};

use crate::{Res, api, api::AppState, config::Settings, info};

/// All routes of the web server.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/up", get(api::health))
        .route("/", get(api::index))
        .route("/player", get(api::index))
        .route("/search", get(api::search))
        .route("/play_track", post(api::play_track))
        .route("/play_playlist", post(api::play_playlist))
        .route("/login", get(api::login))
        .route("/logout", get(api::logout))
        .route("/auth/spotify/callback", get(api::callback))
        .route("/token", get(api::token))
        .layer(Extension(state))
}

pub async fn start_api_server(settings: Settings) -> Res<()> {
    let addr = SocketAddr::from_str(&settings.server_addr)
        .map_err(|e| format!("Failed to parse server address: {}", e))?;
    let public_url = settings.public_url.clone();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {} ({})", addr, public_url);
    axum::serve(listener, app(AppState::new(settings))).await?;
    Ok(())
}
