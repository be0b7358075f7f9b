//! # API Module
//!
//! HTTP endpoints of the syftplayer web server.
//!
//! ## Endpoints
//!
//! ### Pages
//!
//! - [`index`] - `/` and `/player`: login link, or the user's playlists with a
//!   search form and the access token for the browser player
//! - [`search`] - `/search?query=`: HTML results, or JSON when the `Accept`
//!   header asks for it
//!
//! ### Play proxy
//!
//! - [`play_track`] / [`play_playlist`] - validate the command against the
//!   user's devices and start playback upstream. Errors are JSON
//!   [`ProxyErrorBody`](crate::types::ProxyErrorBody) values.
//!
//! ### Authentication
//!
//! - [`login`], [`callback`], [`logout`] - Spotify OAuth (PKCE) and cookie
//!   sessions
//! - [`token`] - fresh access token for the signed-in user
//!
//! ### Monitoring
//!
//! - [`health`] - `/health` and `/up`
//!
//! Handlers receive [`AppState`] through an axum `Extension`.

mod auth;
mod health;
mod pages;
mod player;
mod state;

pub use auth::{callback, login, logout, token};
pub use health::health;
pub use player::{SearchParams, index, play_playlist, play_track, search};
pub use state::AppState;
