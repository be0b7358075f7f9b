//! Spotify web player library
//!
//! Serves a small web player that searches the Spotify catalog and starts
//! playback on a chosen device, and a CLI that reuses the same pieces.
//!
//! # Modules
//!
//! - `api` - HTTP handlers: pages, search, play proxy, OAuth and sessions
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `management` - Token store, cookie sessions, device cache, play forwarding
//! - `playback` - Playback session controller and its driver
//! - `server` - Router and HTTP server
//! - `spotify` - Spotify Web API client implementation
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers
//!
//! # Example
//!
//! ```
//! use syftplayer::{config, server};
//!
//! #[tokio::main]
//! async fn main() -> syftplayer::Res<()> {
//!     config::load_env().await?;
//!     let settings = config::Settings::from_env()?;
//!     server::start_api_server(settings).await
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod management;
pub mod playback;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// Boxed error result used by the CLI and server entry points.
///
/// Library code returns typed errors (`ApiError`, `StoreError`,
/// `PlaybackError`, ...); this alias is where they meet.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational line with a blue `o` marker.
///
/// ```
/// info!("Connecting to Spotify player...");
/// info!("Found {} devices", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success line with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error line with a red `!` and exits with status 1.
///
/// Only for the CLI and startup paths: handlers and the playback session
/// never call it.
///
/// ```
/// error!("Missing required environment variable: {}", var_name);
/// // not reached
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning line with a yellow `!`. Execution continues.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
