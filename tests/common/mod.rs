#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::{Value, json};

use syftplayer::{
    config::{PlayerSettings, Settings, SpotifyConfig},
    types::{Token, UserRecord},
    utils,
};

/// Requests seen by the mock upstream.
#[derive(Debug, Default)]
pub struct UpstreamLog {
    pub play_bodies: Vec<Value>,
    pub play_devices: Vec<String>,
    pub token_forms: Vec<String>,
    pub searches: Vec<HashMap<String, String>>,
}

pub type SharedLog = Arc<Mutex<UpstreamLog>>;

pub fn track_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "uri": format!("spotify:track:{}", id),
        "duration_ms": 224000,
        "artists": [{ "id": "a1", "name": "Daft Punk" }],
        "album": { "id": "al1", "name": "Discovery", "images": [{ "url": "https://img/1" }] }
    })
}

fn upstream_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "status": status.as_u16(), "message": message } })),
    )
        .into_response()
}

async fn devices() -> Json<Value> {
    Json(json!({
        "devices": [
            { "id": "dev1", "name": "Browser", "type": "Computer", "is_active": true },
            { "id": "dev2", "name": "Kitchen", "type": "Speaker", "is_active": false }
        ]
    }))
}

async fn track(Path(id): Path<String>) -> Response {
    if id == "missing" {
        return upstream_error(StatusCode::NOT_FOUND, "Non existing id");
    }
    if id == "broken" {
        return upstream_error(StatusCode::INTERNAL_SERVER_ERROR, "Lookup down");
    }
    Json(track_json(&id, "Harder")).into_response()
}

async fn play(
    Extension(log): Extension<SharedLog>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let uri = body["uris"][0]
        .as_str()
        .or_else(|| body["context_uri"].as_str())
        .unwrap_or("")
        .to_string();
    {
        let mut log = log.lock().unwrap();
        log.play_bodies.push(body.clone());
        log.play_devices
            .push(query.get("device_id").cloned().unwrap_or_default());
    }

    match uri.as_str() {
        "spotify:track:gone" | "spotify:playlist:gone" => upstream_error(StatusCode::NOT_FOUND, "Device not found"),
        "spotify:track:expired" => {
            upstream_error(StatusCode::UNAUTHORIZED, "The access token expired")
        }
        "spotify:track:limited" | "spotify:playlist:limited" => upstream_error(
            StatusCode::FORBIDDEN,
            "Player command failed: Restriction violated",
        ),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn current_playback() -> Json<Value> {
    Json(json!({
        "is_playing": true,
        "progress_ms": 1000,
        "item": track_json("t1", "Harder"),
        "device": { "id": "dev1", "name": "Browser", "type": "Computer", "is_active": true }
    }))
}

async fn transport() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn search(
    Extension(log): Extension<SharedLog>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    log.lock().unwrap().searches.push(query);
    Json(json!({
        "tracks": { "items": [track_json("t1", "Harder"), track_json("t2", "Better")] }
    }))
}

async fn playlists() -> Json<Value> {
    Json(json!({
        "items": [
            { "id": "p1", "name": "K: Morning", "uri": "spotify:playlist:p1", "tracks": { "total": 12 } },
            { "id": "p2", "name": "Workout", "uri": "spotify:playlist:p2", "tracks": { "total": 3 } },
            { "id": "p3", "name": "K: Evening <3", "uri": "spotify:playlist:p3", "tracks": { "total": 7 } }
        ]
    }))
}

async fn me() -> Json<Value> {
    Json(json!({ "id": "user1", "display_name": "User One" }))
}

async fn token_endpoint(Extension(log): Extension<SharedLog>, body: String) -> Response {
    log.lock().unwrap().token_forms.push(body.clone());
    if body.contains("code=bad") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Invalid authorization code" })),
        )
            .into_response();
    }
    if body.contains("grant_type=refresh_token") {
        return Json(json!({
            "access_token": "refreshed-access",
            "token_type": "Bearer",
            "scope": "streaming",
            "expires_in": 3600
        }))
        .into_response();
    }
    Json(json!({
        "access_token": "fresh-access",
        "token_type": "Bearer",
        "scope": "streaming",
        "expires_in": 3600,
        "refresh_token": "fresh-refresh"
    }))
    .into_response()
}

/// Starts a fake Spotify (accounts and Web API) on a free port and returns
/// its base URL.
pub async fn start_upstream() -> (String, SharedLog) {
    let log: SharedLog = Arc::new(Mutex::new(UpstreamLog::default()));
    let app = Router::new()
        .route("/v1/me", get(me))
        .route("/v1/me/player", get(current_playback))
        .route("/v1/me/player/devices", get(devices))
        .route("/v1/me/player/play", put(play))
        .route("/v1/me/player/pause", put(transport))
        .route("/v1/me/player/next", post(transport))
        .route("/v1/me/player/previous", post(transport))
        .route("/v1/tracks/{id}", get(track))
        .route("/v1/search", get(search))
        .route("/v1/me/playlists", get(playlists))
        .route("/api/token", post(token_endpoint))
        .layer(Extension(Arc::clone(&log)));

    let url = serve(app).await;
    (url, log)
}

/// Serves `app` on `127.0.0.1:0` in the background.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("syftplayer-test-{}", utils::generate_random_string(12)));
    dir
}

pub fn spotify_config(upstream: &str) -> SpotifyConfig {
    SpotifyConfig {
        client_id: "client-id".to_string(),
        client_secret: None,
        redirect_uri: "http://127.0.0.1/auth/spotify/callback".to_string(),
        scope: "streaming user-read-email".to_string(),
        auth_url: format!("{}/authorize", upstream),
        token_url: format!("{}/api/token", upstream),
        api_url: format!("{}/v1", upstream),
    }
}

pub fn settings(upstream: &str, data_dir: PathBuf) -> Settings {
    Settings {
        server_addr: "127.0.0.1:0".to_string(),
        public_url: "http://127.0.0.1".to_string(),
        spotify: spotify_config(upstream),
        data_dir,
        playlist_prefix: "K:".to_string(),
        search_market: "US".to_string(),
        search_limit: 10,
        player: PlayerSettings::default(),
    }
}

pub fn token(access_token: &str, obtained_at: u64) -> Token {
    Token {
        access_token: access_token.to_string(),
        refresh_token: "stored-refresh".to_string(),
        scope: "streaming".to_string(),
        expires_in: 3600,
        obtained_at,
    }
}

pub fn user_record(uid: &str, token: Token) -> UserRecord {
    UserRecord {
        uid: uid.to_string(),
        display_name: Some("User One".to_string()),
        token,
        created_at: 1,
        updated_at: 1,
    }
}
