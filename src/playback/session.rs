use tokio::{sync::broadcast, time::Instant};

use super::{
    backend::{CommandFailure, PlaybackBackend},
    command::PlaybackCommand,
    error::{PlaybackError, is_transient_playback_error},
    events::{SdkEvent, SdkPlayerState, SessionSignal},
    sdk::{PlayerSdk, Transport},
    state::{ConnectionState, DeviceStatus, NowPlaying, TrackWindow, status_line},
};
use crate::{
    config::PlayerSettings, info, management::DeviceStore, spotify::ApiError, success, warning,
};

const SIGNAL_CAPACITY: usize = 64;

/// Owns one playback device for the life of the shell.
///
/// All mutation happens through `&mut self`, so the session is driven from a
/// single task (see [`run_session`](super::run_session)). Deadlines are not
/// timers of their own: the driver asks for [`next_deadline`] and calls
/// [`fire_due`] when it passes.
///
/// [`next_deadline`]: PlaybackSession::next_deadline
/// [`fire_due`]: PlaybackSession::fire_due
pub struct PlaybackSession<S, B, D> {
    sdk: S,
    backend: B,
    store: D,
    settings: PlayerSettings,
    token: Option<String>,
    device_id: Option<String>,
    state: ConnectionState,
    player_live: bool,
    sdk_deadline: Option<Instant>,
    reconnect_at: Option<Instant>,
    reconnect_attempts: u32,
    reconnects_scheduled: u64,
    now_playing: Option<NowPlaying>,
    last_label: Option<(String, String)>,
    window: TrackWindow,
    status: String,
    signals: broadcast::Sender<SessionSignal>,
}

impl<S, B, D> PlaybackSession<S, B, D>
where
    S: PlayerSdk,
    B: PlaybackBackend,
    D: DeviceStore,
{
    pub fn new(sdk: S, backend: B, store: D, settings: PlayerSettings) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            sdk,
            backend,
            store,
            settings,
            token: None,
            device_id: None,
            state: ConnectionState::Uninitialized,
            player_live: false,
            sdk_deadline: None,
            reconnect_at: None,
            reconnect_attempts: 0,
            reconnects_scheduled: 0,
            now_playing: None,
            last_label: None,
            window: TrackWindow::default(),
            status: "No track playing".to_string(),
            signals,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.signals.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    pub fn window(&self) -> &TrackWindow {
        &self.window
    }

    /// Text for the status display.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn has_player(&self) -> bool {
        self.player_live
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready && self.device_id.is_some() && self.player_live
    }

    /// Number of reconnect cycles scheduled since the session was created.
    pub fn reconnects_scheduled(&self) -> u64 {
        self.reconnects_scheduled
    }

    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn sdk_load_deadline(&self) -> Option<Instant> {
        self.sdk_deadline
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.sdk_deadline, self.reconnect_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Starts (or restarts after `Failed`) the session with `token`.
    pub async fn initialize(&mut self, token: &str) -> Result<(), PlaybackError> {
        if token.trim().is_empty() {
            self.report(PlaybackError::TokenMissing);
            return Err(PlaybackError::TokenMissing);
        }

        self.token = Some(token.to_string());
        if self.device_id.is_none() {
            self.device_id = self.store.load().await;
        }

        if self.is_ready() {
            return Ok(());
        }

        if self.state == ConnectionState::Failed {
            info!("Restarting failed playback session");
            self.reconnect_attempts = 0;
        }

        if self.player_live
            || (self.state == ConnectionState::ConnectingSdk && self.sdk_deadline.is_some())
        {
            info!("Player setup already in progress");
            return Ok(());
        }

        self.connect_sdk().await;
        Ok(())
    }

    /// Replaces the bearer token, e.g. after the token store refreshed it.
    pub fn update_token(&mut self, token: &str) {
        if token.trim().is_empty() {
            warning!("Ignoring empty Spotify access token");
            return;
        }
        self.token = Some(token.to_string());
    }

    pub async fn handle_sdk_event(&mut self, event: SdkEvent) {
        match event {
            SdkEvent::SdkLoaded => {
                self.emit(SessionSignal::SdkReady);
                if self.state == ConnectionState::ConnectingSdk {
                    self.sdk_deadline = None;
                    self.setup_player().await;
                }
            }
            SdkEvent::Ready { device_id } => self.on_ready(device_id).await,
            SdkEvent::NotReady { device_id } => {
                info!("Spotify player device {} has gone offline", device_id);
                if self.state == ConnectionState::Ready {
                    self.set_state(ConnectionState::AwaitingDevice);
                }
                self.emit(SessionSignal::NotReady { device_id });
            }
            SdkEvent::InitializationError { message } => {
                self.fail(PlaybackError::InitializationError(message)).await
            }
            SdkEvent::AccountError { message } => {
                self.fail(PlaybackError::AccountError(message)).await
            }
            SdkEvent::AuthenticationError { message } => {
                self.emit(SessionSignal::TokenExpired);
                self.schedule_reconnect(PlaybackError::AuthenticationError(message))
                    .await;
            }
            SdkEvent::PlaybackError { message } => {
                if is_transient_playback_error(&message) {
                    self.schedule_reconnect(PlaybackError::Playback(message))
                        .await;
                } else {
                    self.report(PlaybackError::Playback(message));
                }
            }
            SdkEvent::PlayerStateChanged(state) => self.apply_player_state(state),
        }
    }

    /// Fires every deadline at or before `now`.
    pub async fn fire_due(&mut self, now: Instant) {
        if self.sdk_deadline.is_some_and(|d| d <= now) {
            self.sdk_deadline = None;
            self.on_sdk_load_timeout().await;
        }
        if self.reconnect_at.is_some_and(|d| d <= now) {
            self.reconnect_at = None;
            if self.state == ConnectionState::Reconnecting {
                info!("Reconnecting Spotify player");
                self.connect_sdk().await;
            }
        }
    }

    /// Plays a track or a context on `target_device_id` (the session's own
    /// device when empty).
    pub async fn play(&mut self, uri: &str, target_device_id: &str) -> Result<(), PlaybackError> {
        let Some(own_device) = self.device_id.clone().filter(|_| self.is_ready()) else {
            self.report(PlaybackError::DeviceUnavailable);
            return Err(PlaybackError::DeviceUnavailable);
        };

        let device_id = if target_device_id.is_empty() {
            own_device
        } else {
            target_device_id.to_string()
        };
        let command = PlaybackCommand::for_uri(uri, &device_id);
        info!("Attempting to play {} on device {}", uri, device_id);

        match self.backend.send_command(&command).await {
            Ok(()) => {
                success!("Play request accepted for {}", uri);
                self.refresh_now_playing().await;
                Ok(())
            }
            Err(CommandFailure::Status { status: 404, .. }) => {
                self.schedule_reconnect(PlaybackError::TrackOrDeviceNotFound)
                    .await;
                Err(PlaybackError::TrackOrDeviceNotFound)
            }
            Err(CommandFailure::Status { status: 401, .. }) => {
                self.emit(SessionSignal::TokenExpired);
                self.report(PlaybackError::SessionExpired);
                Err(PlaybackError::SessionExpired)
            }
            Err(CommandFailure::Status { message, .. }) | Err(CommandFailure::Network(message)) => {
                let error = PlaybackError::UpstreamError { message };
                self.report(error.clone());
                Err(error)
            }
        }
    }

    pub async fn resume(&mut self) {
        self.transport(Transport::Resume).await
    }

    pub async fn pause(&mut self) {
        self.transport(Transport::Pause).await
    }

    pub async fn previous_track(&mut self) {
        self.transport(Transport::PreviousTrack).await
    }

    pub async fn next_track(&mut self) {
        self.transport(Transport::NextTrack).await
    }

    /// Fire-and-forget transport control. Failures are logged and the view is
    /// resynchronized from a poll.
    pub async fn transport(&mut self, action: Transport) {
        if !self.player_live {
            warning!("Player not initialized, cannot {}", action);
            return;
        }

        match self.sdk.transport(action).await {
            Ok(()) => info!("Requested to {}", action),
            Err(e) => {
                warning!("Error trying to {}: {}", action, e);
                self.refresh_now_playing().await;
            }
        }
    }

    /// Confirms the cached device with the upstream device list, resetting
    /// and reinitializing the player when the device disappeared.
    pub async fn check_device_status(&mut self) -> Result<DeviceStatus, PlaybackError> {
        let (Some(token), Some(device_id)) = (self.token.clone(), self.device_id.clone()) else {
            return Err(PlaybackError::DeviceUnavailable);
        };

        let devices = match self.backend.devices(&token).await {
            Ok(devices) => devices,
            Err(ApiError::Unauthorized(_)) => {
                self.emit(SessionSignal::TokenExpired);
                self.report(PlaybackError::SessionExpired);
                return Err(PlaybackError::SessionExpired);
            }
            Err(e) => {
                let error = PlaybackError::UpstreamError {
                    message: e.to_string(),
                };
                self.report(error.clone());
                return Err(error);
            }
        };

        if devices
            .iter()
            .any(|d| d.id.as_deref() == Some(device_id.as_str()))
        {
            if self.state == ConnectionState::AwaitingDevice && self.player_live {
                self.set_state(ConnectionState::Ready);
            }
            return Ok(DeviceStatus::Valid);
        }

        info!("Device {} not found among available devices, resetting", device_id);
        self.forget_device().await;
        self.dispose_player().await;
        if self.state != ConnectionState::Failed {
            self.connect_sdk().await;
        }
        Ok(DeviceStatus::Invalid)
    }

    /// Polls what the account is playing and applies it as the newest record.
    pub async fn refresh_now_playing(&mut self) -> Option<NowPlaying> {
        let token = self.token.clone()?;
        match self.backend.current_playback(&token).await {
            Ok(Some(playback)) => {
                if let Some(now_playing) = NowPlaying::from_poll(&playback) {
                    self.apply_now_playing(now_playing);
                }
            }
            Ok(None) => {}
            Err(ApiError::Unauthorized(message)) => {
                warning!("Error fetching current playback: {}", message);
                self.emit(SessionSignal::TokenExpired);
            }
            Err(e) => warning!("Error fetching current playback: {}", e),
        }
        self.now_playing.clone()
    }

    async fn connect_sdk(&mut self) {
        self.set_state(ConnectionState::ConnectingSdk);
        if self.sdk.is_loaded() {
            self.sdk_deadline = None;
            self.setup_player().await;
        } else if self.sdk_deadline.is_none() {
            info!("Waiting for the Spotify Web Playback SDK to load");
            self.sdk_deadline = Some(Instant::now() + self.settings.sdk_load_timeout);
        }
    }

    async fn setup_player(&mut self) {
        if self.player_live {
            info!("Player already exists");
            return;
        }
        if !self.sdk.is_loaded() {
            self.fail(PlaybackError::SdkMissing).await;
            return;
        }
        let Some(token) = self.token.clone() else {
            self.fail(PlaybackError::TokenMissing).await;
            return;
        };

        self.player_live = true;
        self.set_state(ConnectionState::AwaitingDevice);
        info!("Connecting to Spotify player...");

        let reason = match self.sdk.connect(&token, &self.settings.name).await {
            Ok(true) => {
                success!("Successfully connected to Spotify!");
                return;
            }
            Ok(false) => "Failed to connect to Spotify".to_string(),
            Err(e) => format!("Failed to connect to Spotify: {}", e),
        };
        self.schedule_reconnect(PlaybackError::Playback(reason)).await;
    }

    async fn on_ready(&mut self, device_id: String) {
        if self.state == ConnectionState::Failed {
            warning!("Ignoring ready event for {} on a failed session", device_id);
            return;
        }
        if !self.player_live {
            warning!("Ignoring ready event for {} without a player", device_id);
            return;
        }

        info!("Spotify player ready with device id {}", device_id);
        self.store.store(&device_id).await;
        self.device_id = Some(device_id.clone());
        self.reconnect_at = None;
        self.reconnect_attempts = 0;
        self.set_state(ConnectionState::Ready);
        self.emit(SessionSignal::Ready { device_id });
    }

    async fn on_sdk_load_timeout(&mut self) {
        if self.state != ConnectionState::ConnectingSdk {
            return;
        }
        if self.sdk.is_loaded() {
            self.setup_player().await;
        } else {
            self.fail(PlaybackError::SdkLoadTimeout).await;
        }
    }

    /// Disposes the player, forgets the device and arms the backoff timer.
    async fn schedule_reconnect(&mut self, reason: PlaybackError) {
        if self.state == ConnectionState::Failed {
            self.report(reason);
            return;
        }
        if self.state == ConnectionState::Reconnecting && self.reconnect_at.is_some() {
            info!("Reconnect already pending, ignoring: {}", reason);
            return;
        }

        self.dispose_player().await;
        self.forget_device().await;

        self.reconnect_attempts += 1;
        let policy = self.settings.reconnect.clone();
        if !policy.allows(self.reconnect_attempts) {
            warning!(
                "Giving up after {} reconnect attempts",
                self.reconnect_attempts - 1
            );
            self.fail(reason).await;
            return;
        }

        self.report(reason);

        let delay = policy.delay(self.reconnect_attempts);
        warning!(
            "Reconnecting Spotify player in {} ms (attempt {})",
            delay.as_millis(),
            self.reconnect_attempts
        );
        self.reconnect_at = Some(Instant::now() + delay);
        self.reconnects_scheduled += 1;
        self.set_state(ConnectionState::Reconnecting);
    }

    async fn fail(&mut self, error: PlaybackError) {
        self.report(error);
        self.dispose_player().await;
        self.sdk_deadline = None;
        self.reconnect_at = None;
        self.set_state(ConnectionState::Failed);
    }

    async fn dispose_player(&mut self) {
        if self.player_live {
            self.sdk.disconnect().await;
            self.player_live = false;
        }
    }

    async fn forget_device(&mut self) {
        self.device_id = None;
        self.store.clear().await;
    }

    fn apply_player_state(&mut self, state: Option<SdkPlayerState>) {
        let Some(state) = state else {
            return;
        };

        self.window = TrackWindow::from_state(&state);
        self.emit(SessionSignal::PlayerStateChanged(self.window.clone()));

        match &state.track_window.current_track {
            Some(track) => self.apply_now_playing(NowPlaying::from_sdk(track, &state)),
            None => {
                self.now_playing = None;
                self.status = match &self.last_label {
                    Some((name, artists)) => status_line(state.paused, name, artists),
                    None => "No track playing".to_string(),
                };
            }
        }
    }

    /// Last write wins: the newest record replaces the view whatever its
    /// source.
    fn apply_now_playing(&mut self, now_playing: NowPlaying) {
        self.status = now_playing.status_line();
        self.last_label = Some((
            now_playing.track_name.clone(),
            now_playing.primary_artist().to_string(),
        ));
        self.now_playing = Some(now_playing.clone());
        self.emit(SessionSignal::TrackChanged(now_playing));
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            info!("Playback session {} -> {}", self.state, state);
            self.state = state;
            self.emit(SessionSignal::StateChanged(state));
        }
    }

    fn report(&mut self, error: PlaybackError) {
        warning!("{}", error);
        self.status = error.to_string();
        self.emit(SessionSignal::Error(error));
    }

    fn emit(&self, signal: SessionSignal) {
        // No subscribers is fine.
        let _ = self.signals.send(signal);
    }
}
