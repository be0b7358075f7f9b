use std::collections::HashMap;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::Query,
    http::{HeaderMap, StatusCode, header::ACCEPT},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;

use super::{AppState, pages};
use crate::{
    info,
    management::{ProxyError, StoreError, proxy},
    playback::{CommandKind, PlaybackCommand},
    spotify::ApiError,
    types::PlayRequest,
    utils, warning,
};

const PLAYLIST_LIMIT: u32 = 50;

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status()).unwrap_or(StatusCode::BAD_GATEWAY);
        (status, Json(self.body())).into_response()
    }
}

impl From<StoreError> for ProxyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownUser(_) => ProxyError::NotAuthenticated,
            StoreError::Refresh(ApiError::Unauthorized(_)) => ProxyError::Unauthorized,
            StoreError::Refresh(api) => api.into(),
            other => ProxyError::Upstream {
                status: 500,
                message: other.to_string(),
            },
        }
    }
}

/// `/` and `/player`.
pub async fn index(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Html<String> {
    let notice = params.get("notice").map(String::as_str);
    let Some(uid) = state.current_user(&headers).await else {
        return Html(pages::login_page(notice));
    };

    let token = match state.fresh_token(&uid).await {
        Ok(token) => token,
        Err(e) => {
            warning!("No usable token for {}: {}", uid, e);
            return Html(pages::login_page(Some("login_required")));
        }
    };

    let playlists = match state
        .spotify
        .current_user_playlists(&token, PLAYLIST_LIMIT)
        .await
    {
        Ok(playlists) => utils::filter_playlists_by_prefix(playlists, &state.settings.playlist_prefix),
        Err(e) => {
            warning!("Cannot fetch playlists for {}: {}", uid, e);
            Vec::new()
        }
    };

    let display_name = match state.tokens.load(&uid).await {
        Ok(record) => record.display_name.unwrap_or(uid),
        Err(_) => uid,
    };
    Html(pages::player_page(&display_name, &playlists, notice))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
}

pub async fn search(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Response {
    let json = utils::wants_json(headers.get(ACCEPT).and_then(|v| v.to_str().ok()));
    let query = params.query.as_deref().map(str::trim).unwrap_or("");

    let Some(uid) = state.current_user(&headers).await else {
        return if json {
            ProxyError::NotAuthenticated.into_response()
        } else {
            Redirect::to("/?notice=login_required").into_response()
        };
    };

    if query.is_empty() {
        return if json {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "No search query provided" })),
            )
                .into_response()
        } else {
            Redirect::to("/player").into_response()
        };
    }

    let result = match state.fresh_token(&uid).await {
        Ok(token) => state
            .spotify
            .search_tracks(
                &token,
                query,
                state.settings.search_limit,
                &state.settings.search_market,
            )
            .await
            .map_err(ProxyError::from),
        Err(e) => Err(ProxyError::from(e)),
    };

    match result {
        Ok(tracks) if json => Json(tracks).into_response(),
        Ok(tracks) => Html(pages::search_page(query, &tracks)).into_response(),
        Err(e) => {
            warning!("Search for '{}' failed: {}", query, e);
            e.into_response()
        }
    }
}

pub async fn play_track(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    play(state, headers, body, CommandKind::PlayTrack).await
}

pub async fn play_playlist(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    play(state, headers, body, CommandKind::PlayPlaylist).await
}

async fn play(state: AppState, headers: HeaderMap, body: Bytes, kind: CommandKind) -> Response {
    let Some(uid) = state.current_user(&headers).await else {
        return ProxyError::NotAuthenticated.into_response();
    };

    // A body that is not a JSON object is treated like one without parameters.
    let request: PlayRequest = serde_json::from_slice(&body).unwrap_or_default();
    let uri = request.uri.as_deref().map(str::trim).unwrap_or("");
    let device_id = request.device_id.as_deref().map(str::trim).unwrap_or("");
    if uri.is_empty() || device_id.is_empty() {
        return ProxyError::MissingParams(kind).into_response();
    }

    info!(
        "Attempting to play {} {} on device {} for user {}",
        kind.noun(),
        uri,
        device_id,
        uid
    );

    let token = match state.fresh_token(&uid).await {
        Ok(token) => token,
        Err(e) => {
            warning!("No usable token for {}: {}", uid, e);
            return ProxyError::from(e).into_response();
        }
    };

    let command = PlaybackCommand::new(kind, uri, device_id);
    match proxy::forward_play(&state.spotify, &token, &command).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => {
            warning!("Playing {} {} failed: {}", kind.noun(), uri, e);
            e.into_response()
        }
    }
}
