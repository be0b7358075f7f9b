//! # CLI Module
//!
//! User-facing commands of syftplayer.
//!
//! - [`serve`] - runs the web player, optionally opening it in the browser
//! - [`login`] - signs in through the browser and stores the token locally
//! - [`devices`] - lists the Spotify Connect devices of the stored user
//! - [`search`] - searches tracks and prints them as a table
//! - [`play`] - plays a track or playlist URI on a named device through a
//!   [`PlaybackSession`](crate::playback::PlaybackSession)
//!
//! Commands that talk to Spotify use the user from `--user` or, when absent,
//! whoever logged in last. Tokens are refreshed before use.
//!
//! ```bash
//! syftplayer login
//! syftplayer devices
//! syftplayer search "daft punk"
//! syftplayer play spotify:track:4uLU6hMCjMI75M1A2tKUQC --device Kitchen
//! ```
//!
//! Fatal problems are reported through the `error!` macro, which exits the
//! process.

mod auth;
mod common;
mod devices;
mod play;
mod search;
mod serve;

pub use auth::login;
pub use devices::devices;
pub use play::play;
pub use search::search;
pub use serve::serve;
