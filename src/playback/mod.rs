//! # Playback Session
//!
//! The client side of syftplayer: one [`PlaybackSession`] owns one playback
//! device, mediates every transport action and keeps a single "now playing"
//! view.
//!
//! ```text
//!                 initialize(token)
//! Uninitialized ─────────────────────▶ ConnectingSdk ──(sdk loaded)──▶ AwaitingDevice
//!                                           ▲                              │   ▲
//!                                           │ backoff elapsed        ready │   │ not_ready
//!                                           │                              ▼   │
//!                                      Reconnecting ◀──(transient error)── Ready
//!
//!   any ──(initialization / account error, sdk missing, load timeout)──▶ Failed
//! ```
//!
//! ## Seams
//!
//! - [`PlayerSdk`]: the player itself (browser SDK or [`RemoteDeviceSdk`]).
//! - [`PlaybackBackend`]: play commands through the proxy, device list and
//!   current playback from the Web API ([`HttpBackend`], [`DirectBackend`]).
//! - [`DeviceStore`](crate::management::DeviceStore): where the last device
//!   id survives reloads.
//!
//! ## Reconciliation
//!
//! The SDK pushes player states for this device; polls report what the
//! account plays anywhere. Whichever arrives last replaces the whole
//! [`NowPlaying`] record.
//!
//! ## Driving
//!
//! [`run_session`] processes SDK events, [`SessionHandle`] commands and the
//! session's deadlines on a single task.
//! [`refresh_on_token_expired`] runs beside it and answers `TokenExpired`
//! signals with a refreshed token.

mod backend;
mod backoff;
mod command;
mod driver;
mod error;
mod events;
mod remote;
mod sdk;
mod session;
mod state;

pub use backend::{CommandFailure, DirectBackend, HttpBackend, PlaybackBackend};
pub use backoff::ReconnectPolicy;
pub use command::{CommandKind, PlaybackCommand};
pub use driver::{
    SessionCommand, SessionHandle, SessionSnapshot, refresh_on_token_expired, run_session,
};
pub use error::{PlaybackError, is_transient_playback_error};
pub use events::{
    SdkContext, SdkContextMetadata, SdkEvent, SdkPlayerState, SdkTrackWindow, SessionSignal,
};
pub use remote::RemoteDeviceSdk;
pub use sdk::{PlayerSdk, Transport};
pub use session::PlaybackSession;
pub use state::{
    ConnectionState, DeviceStatus, NowPlaying, NowPlayingSource, TrackWindow, WindowEntry,
    status_line,
};
