use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::Query,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

use super::AppState;
use crate::{
    management::{SESSION_COOKIE, StoreError},
    spotify::ApiError,
    success, utils, warning,
};

fn session_cookie(value: &str, max_age: Option<u64>) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, value);
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    cookie
}

/// Starts a PKCE login and sends the browser to Spotify.
pub async fn login(Extension(state): Extension<AppState>) -> Response {
    let verifier = utils::generate_code_verifier();
    let challenge = utils::generate_code_challenge(&verifier);
    let oauth_state = state.sessions.start_login(verifier).await;

    match state.spotify.authorize_url(&oauth_state, &challenge) {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => {
            warning!("{}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Login is not configured").into_response()
        }
    }
}

pub async fn callback(
    Extension(state): Extension<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let failed = || Redirect::to("/?notice=auth_failed").into_response();

    if let Some(error) = params.get("error") {
        warning!("Spotify refused the login: {}", error);
        return failed();
    }
    let (Some(code), Some(oauth_state)) = (params.get("code"), params.get("state")) else {
        warning!("OAuth callback without code or state");
        return failed();
    };
    let Some(pending) = state.sessions.take_login(oauth_state).await else {
        warning!("OAuth callback with unknown or expired state");
        return failed();
    };

    let token = match state
        .spotify
        .exchange_code_pkce(code, &pending.code_verifier)
        .await
    {
        Ok(token) => token,
        Err(e) => {
            warning!("Token exchange failed: {}", e);
            return failed();
        }
    };

    let profile = match state.spotify.current_user(&token.access_token).await {
        Ok(profile) => profile,
        Err(e) => {
            warning!("Cannot fetch Spotify profile: {}", e);
            return failed();
        }
    };

    let record = match state.tokens.from_oauth(&profile, token).await {
        Ok(record) => record,
        Err(e) => {
            warning!("Cannot store Spotify user {}: {}", profile.id, e);
            return failed();
        }
    };

    let session_id = state.sign_in(&record.uid).await;
    success!("Signed in Spotify user {}", record.uid);
    (
        [(SET_COOKIE, session_cookie(&session_id, None))],
        Redirect::to("/player?notice=signed_in"),
    )
        .into_response()
}

pub async fn logout(Extension(state): Extension<AppState>, headers: HeaderMap) -> Response {
    if let Some(session_id) = AppState::session_id(&headers) {
        state.sessions.remove(&session_id).await;
    }
    (
        [(SET_COOKIE, session_cookie("", Some(0)))],
        Redirect::to("/?notice=logged_out"),
    )
        .into_response()
}

/// Fresh access token for the signed-in user.
pub async fn token(Extension(state): Extension<AppState>, headers: HeaderMap) -> Response {
    let Some(uid) = state.current_user(&headers).await else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Not authenticated with Spotify" })),
        )
            .into_response();
    };

    let result = match state.fresh_token(&uid).await {
        Ok(_) => state.tokens.load(&uid).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(record) => Json(json!({
            "access_token": record.token.access_token,
            "expires_at": record.token.expires_at(),
        }))
        .into_response(),
        Err(e @ (StoreError::UnknownUser(_) | StoreError::Refresh(ApiError::Unauthorized(_)))) => {
            warning!("Token for {} unavailable: {}", uid, e);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Authorization failed" })),
            )
                .into_response()
        }
        Err(e) => {
            warning!("Token for {} unavailable: {}", uid, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
