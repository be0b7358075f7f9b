use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::{broadcast, mpsc},
    time::Instant,
};

use syftplayer::{
    config::PlayerSettings,
    management::{DeviceStore, MemoryDeviceStore},
    playback::*,
    spotify::ApiError,
    types::{CurrentPlayback, Device, SimpleAlbum, SimpleArtist, Track},
};

// ---- test doubles ----

#[derive(Default)]
struct SdkLog {
    connects: u32,
    tokens: Vec<String>,
    disconnects: u32,
    transports: Vec<Transport>,
    connect_error: Option<String>,
    transport_error: Option<String>,
}

#[derive(Clone)]
struct MockSdk {
    loaded: Arc<AtomicBool>,
    log: Arc<Mutex<SdkLog>>,
}

impl MockSdk {
    fn new(loaded: bool) -> Self {
        Self {
            loaded: Arc::new(AtomicBool::new(loaded)),
            log: Arc::new(Mutex::new(SdkLog::default())),
        }
    }

    fn connects(&self) -> u32 {
        self.log.lock().unwrap().connects
    }

    fn disconnects(&self) -> u32 {
        self.log.lock().unwrap().disconnects
    }

    fn tokens(&self) -> Vec<String> {
        self.log.lock().unwrap().tokens.clone()
    }
}

impl PlayerSdk for MockSdk {
    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn connect(&mut self, token: &str, _player_name: &str) -> Result<bool, String> {
        let mut log = self.log.lock().unwrap();
        log.connects += 1;
        log.tokens.push(token.to_string());
        match log.connect_error.clone() {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    async fn disconnect(&mut self) {
        self.log.lock().unwrap().disconnects += 1;
    }

    async fn transport(&mut self, action: Transport) -> Result<(), String> {
        let mut log = self.log.lock().unwrap();
        log.transports.push(action);
        match log.transport_error.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

enum DevicesReply {
    List(Vec<Device>),
    Unauthorized,
}

struct BackendLog {
    commands: Vec<PlaybackCommand>,
    command_replies: VecDeque<Result<(), CommandFailure>>,
    devices: DevicesReply,
    playback: Option<CurrentPlayback>,
    polls: u32,
}

#[derive(Clone)]
struct MockBackend {
    log: Arc<Mutex<BackendLog>>,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(BackendLog {
                commands: vec![],
                command_replies: VecDeque::new(),
                devices: DevicesReply::List(vec![]),
                playback: None,
                polls: 0,
            })),
        }
    }

    fn reply_with(&self, reply: Result<(), CommandFailure>) {
        self.log.lock().unwrap().command_replies.push_back(reply);
    }

    fn set_devices(&self, devices: DevicesReply) {
        self.log.lock().unwrap().devices = devices;
    }

    fn set_playback(&self, playback: Option<CurrentPlayback>) {
        self.log.lock().unwrap().playback = playback;
    }

    fn commands(&self) -> Vec<PlaybackCommand> {
        self.log.lock().unwrap().commands.clone()
    }

    fn polls(&self) -> u32 {
        self.log.lock().unwrap().polls
    }
}

impl PlaybackBackend for MockBackend {
    async fn send_command(&self, command: &PlaybackCommand) -> Result<(), CommandFailure> {
        let mut log = self.log.lock().unwrap();
        log.commands.push(command.clone());
        log.command_replies.pop_front().unwrap_or(Ok(()))
    }

    async fn devices(&self, _token: &str) -> Result<Vec<Device>, ApiError> {
        match &self.log.lock().unwrap().devices {
            DevicesReply::List(devices) => Ok(devices.clone()),
            DevicesReply::Unauthorized => Err(ApiError::Unauthorized("expired".to_string())),
        }
    }

    async fn current_playback(&self, _token: &str) -> Result<Option<CurrentPlayback>, ApiError> {
        let mut log = self.log.lock().unwrap();
        log.polls += 1;
        Ok(log.playback.clone())
    }
}

type Session = PlaybackSession<MockSdk, MockBackend, MemoryDeviceStore>;

struct Harness {
    session: Session,
    sdk: MockSdk,
    backend: MockBackend,
    store: MemoryDeviceStore,
    signals: broadcast::Receiver<SessionSignal>,
}

fn settings() -> PlayerSettings {
    PlayerSettings::default()
}

fn harness_with(loaded: bool, store: MemoryDeviceStore, settings: PlayerSettings) -> Harness {
    let sdk = MockSdk::new(loaded);
    let backend = MockBackend::new();
    let session = PlaybackSession::new(sdk.clone(), backend.clone(), store.clone(), settings);
    let signals = session.subscribe();
    Harness {
        session,
        sdk,
        backend,
        store,
        signals,
    }
}

fn harness() -> Harness {
    harness_with(true, MemoryDeviceStore::default(), settings())
}

/// A session that is `Ready` on device `abc`.
async fn ready_harness() -> Harness {
    let mut h = harness();
    h.session.initialize("token").await.unwrap();
    h.session
        .handle_sdk_event(SdkEvent::Ready {
            device_id: "abc".to_string(),
        })
        .await;
    assert_eq!(h.session.state(), ConnectionState::Ready);
    drain(&mut h.signals);
    h
}

fn drain(signals: &mut broadcast::Receiver<SessionSignal>) -> Vec<SessionSignal> {
    let mut out = vec![];
    while let Ok(signal) = signals.try_recv() {
        out.push(signal);
    }
    out
}

fn device(id: &str, name: &str) -> Device {
    Device {
        id: Some(id.to_string()),
        name: name.to_string(),
        device_type: "Computer".to_string(),
        is_active: false,
    }
}

fn track(name: &str, artist: &str) -> Track {
    Track {
        id: Some(format!("{}-id", name)),
        name: name.to_string(),
        uri: format!("spotify:track:{}-id", name),
        duration_ms: 200_000,
        artists: vec![SimpleArtist {
            id: None,
            name: artist.to_string(),
        }],
        album: Some(SimpleAlbum {
            id: None,
            name: format!("{} album", name),
            images: vec![],
        }),
    }
}

fn playback_of(track: Track, is_playing: bool) -> CurrentPlayback {
    CurrentPlayback {
        is_playing,
        progress_ms: Some(1_000),
        item: Some(track),
        device: None,
    }
}

fn sdk_state(current: Option<Track>, paused: bool) -> SdkPlayerState {
    SdkPlayerState {
        paused,
        position: 5_000,
        duration: 200_000,
        track_window: SdkTrackWindow {
            current_track: current,
            previous_tracks: vec![track("Before", "A")],
            next_tracks: vec![track("After", "B"), track("Later", "C")],
        },
        context: Some(SdkContext {
            uri: Some("spotify:playlist:k".to_string()),
            metadata: Some(SdkContextMetadata {
                name: Some("K: Evening".to_string()),
            }),
        }),
    }
}

// ---- initialize ----

#[tokio::test]
async fn test_initialize_with_empty_token_fails() {
    let mut h = harness();

    let result = h.session.initialize("").await;

    assert_eq!(result, Err(PlaybackError::TokenMissing));
    assert_eq!(h.session.state(), ConnectionState::Uninitialized);
    assert_eq!(h.sdk.connects(), 0);
    assert!(
        drain(&mut h.signals).contains(&SessionSignal::Error(PlaybackError::TokenMissing))
    );
}

#[tokio::test]
async fn test_ready_caches_device_id() {
    let mut h = harness();

    h.session.initialize("token").await.unwrap();
    assert_eq!(h.session.state(), ConnectionState::AwaitingDevice);

    h.session
        .handle_sdk_event(SdkEvent::Ready {
            device_id: "abc".to_string(),
        })
        .await;

    assert_eq!(h.session.state(), ConnectionState::Ready);
    assert_eq!(h.session.device_id(), Some("abc"));
    assert_eq!(h.store.get().await, Some("abc".to_string()));
    assert!(drain(&mut h.signals).contains(&SessionSignal::Ready {
        device_id: "abc".to_string()
    }));
}

#[tokio::test]
async fn test_initialize_is_idempotent_when_ready() {
    let mut h = ready_harness().await;

    h.session.initialize("token").await.unwrap();

    assert_eq!(h.sdk.connects(), 1);
    assert_eq!(h.session.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn test_initialize_restores_cached_device() {
    let mut h = harness_with(true, MemoryDeviceStore::with_device("cached"), settings());

    h.session.initialize("token").await.unwrap();

    assert_eq!(h.session.device_id(), Some("cached"));
    // Not ready until the SDK confirms the device.
    assert!(!h.session.is_ready());
}

#[tokio::test]
async fn test_sdk_loaded_later_sets_up_player() {
    let mut h = harness_with(false, MemoryDeviceStore::default(), settings());

    h.session.initialize("token").await.unwrap();
    assert_eq!(h.session.state(), ConnectionState::ConnectingSdk);
    assert!(h.session.sdk_load_deadline().is_some());
    assert_eq!(h.sdk.connects(), 0);

    h.sdk.loaded.store(true, Ordering::SeqCst);
    h.session.handle_sdk_event(SdkEvent::SdkLoaded).await;

    assert_eq!(h.session.state(), ConnectionState::AwaitingDevice);
    assert!(h.session.sdk_load_deadline().is_none());
    assert_eq!(h.sdk.connects(), 1);
    assert!(drain(&mut h.signals).contains(&SessionSignal::SdkReady));
}

#[tokio::test]
async fn test_sdk_load_timeout_fails_without_retry() {
    let mut h = harness_with(false, MemoryDeviceStore::default(), settings());

    h.session.initialize("token").await.unwrap();
    let deadline = h.session.sdk_load_deadline().unwrap();
    h.session.fire_due(deadline).await;

    assert_eq!(h.session.state(), ConnectionState::Failed);
    assert!(h.session.next_deadline().is_none());
    assert!(
        drain(&mut h.signals).contains(&SessionSignal::Error(PlaybackError::SdkLoadTimeout))
    );

    // A late load does not revive the session.
    h.sdk.loaded.store(true, Ordering::SeqCst);
    h.session.handle_sdk_event(SdkEvent::SdkLoaded).await;
    assert_eq!(h.session.state(), ConnectionState::Failed);
    assert_eq!(h.sdk.connects(), 0);
}

#[tokio::test]
async fn test_sdk_loaded_without_sdk_fails() {
    let mut h = harness_with(false, MemoryDeviceStore::default(), settings());
    h.session.initialize("token").await.unwrap();
    drain(&mut h.signals);

    // The load event arrives but the SDK object is still not there.
    h.session.handle_sdk_event(SdkEvent::SdkLoaded).await;

    assert_eq!(h.session.state(), ConnectionState::Failed);
    assert!(h.session.next_deadline().is_none());
    assert_eq!(h.sdk.connects(), 0);
    let errors: Vec<_> = drain(&mut h.signals)
        .into_iter()
        .filter(|s| matches!(s, SessionSignal::Error(_)))
        .collect();
    assert_eq!(errors, vec![SessionSignal::Error(PlaybackError::SdkMissing)]);
}

#[tokio::test]
async fn test_device_check_keeps_sdk_load_deadline() {
    let mut h = harness_with(false, MemoryDeviceStore::default(), settings());
    h.session.initialize("token").await.unwrap();
    let deadline = h.session.sdk_load_deadline().unwrap();

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        // A cached device that upstream no longer lists.
        h.store.store("stale").await;
        h.session.initialize("token").await.unwrap();
        assert_eq!(
            h.session.check_device_status().await,
            Ok(DeviceStatus::Invalid)
        );
    }

    assert_eq!(h.session.state(), ConnectionState::ConnectingSdk);
    assert_eq!(h.session.sdk_load_deadline(), Some(deadline));
    h.session.fire_due(deadline).await;
    assert_eq!(h.session.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_deadline_not_fired_early() {
    let mut h = harness_with(false, MemoryDeviceStore::default(), settings());

    h.session.initialize("token").await.unwrap();
    h.session.fire_due(Instant::now()).await;

    assert_eq!(h.session.state(), ConnectionState::ConnectingSdk);
}

// ---- ready / not_ready ----

#[tokio::test]
async fn test_not_ready_keeps_cached_id() {
    let mut h = ready_harness().await;

    h.session
        .handle_sdk_event(SdkEvent::NotReady {
            device_id: "abc".to_string(),
        })
        .await;

    assert_eq!(h.session.state(), ConnectionState::AwaitingDevice);
    assert_eq!(h.session.device_id(), Some("abc"));
    assert!(drain(&mut h.signals).contains(&SessionSignal::NotReady {
        device_id: "abc".to_string()
    }));
}

#[tokio::test]
async fn test_state_follows_last_ready_event() {
    let mut h = ready_harness().await;
    let sequence = [true, false, false, true, false, true, true, false];

    for ready in sequence {
        let event = if ready {
            SdkEvent::Ready {
                device_id: "abc".to_string(),
            }
        } else {
            SdkEvent::NotReady {
                device_id: "abc".to_string(),
            }
        };
        h.session.handle_sdk_event(event).await;
        assert_eq!(h.session.is_ready(), ready);
    }
}

#[tokio::test]
async fn test_ready_ignored_after_fatal_error() {
    let mut h = ready_harness().await;

    h.session
        .handle_sdk_event(SdkEvent::AccountError {
            message: "Premium required".to_string(),
        })
        .await;
    assert_eq!(h.session.state(), ConnectionState::Failed);

    h.session
        .handle_sdk_event(SdkEvent::Ready {
            device_id: "abc".to_string(),
        })
        .await;
    assert_eq!(h.session.state(), ConnectionState::Failed);
    assert!(!h.session.is_ready());
}

#[tokio::test]
async fn test_initialize_restarts_failed_session() {
    let mut h = harness();
    h.session.initialize("token").await.unwrap();
    h.session
        .handle_sdk_event(SdkEvent::InitializationError {
            message: "boom".to_string(),
        })
        .await;
    assert_eq!(h.session.state(), ConnectionState::Failed);
    assert_eq!(h.sdk.disconnects(), 1);

    h.session.initialize("token").await.unwrap();

    assert_eq!(h.session.state(), ConnectionState::AwaitingDevice);
    assert_eq!(h.sdk.connects(), 2);
}

// ---- reconnect ----

#[tokio::test]
async fn test_transient_playback_error_schedules_one_reconnect() {
    let mut h = ready_harness().await;
    let before = Instant::now();

    h.session
        .handle_sdk_event(SdkEvent::PlaybackError {
            message: "Device not found".to_string(),
        })
        .await;

    assert_eq!(h.session.state(), ConnectionState::Reconnecting);
    assert_eq!(h.session.device_id(), None);
    assert_eq!(h.store.get().await, None);
    assert_eq!(h.sdk.disconnects(), 1);
    assert_eq!(h.session.reconnects_scheduled(), 1);

    let deadline = h.session.reconnect_deadline().unwrap();
    assert!(deadline >= before + Duration::from_millis(3000));
    assert!(deadline <= Instant::now() + Duration::from_millis(3000));

    // A second error while the reconnect is pending does not start another cycle.
    h.session
        .handle_sdk_event(SdkEvent::PlaybackError {
            message: "404".to_string(),
        })
        .await;
    assert_eq!(h.session.reconnects_scheduled(), 1);
    assert_eq!(h.session.reconnect_deadline(), Some(deadline));

    h.session.fire_due(deadline).await;
    assert_eq!(h.sdk.connects(), 2);
    assert_eq!(h.session.state(), ConnectionState::AwaitingDevice);

    h.session
        .handle_sdk_event(SdkEvent::Ready {
            device_id: "new".to_string(),
        })
        .await;
    assert_eq!(h.session.state(), ConnectionState::Ready);
    assert_eq!(h.session.device_id(), Some("new"));
}

#[tokio::test]
async fn test_non_transient_playback_error_is_only_reported() {
    let mut h = ready_harness().await;

    h.session
        .handle_sdk_event(SdkEvent::PlaybackError {
            message: "Cannot perform operation; no list was loaded.".to_string(),
        })
        .await;

    assert_eq!(h.session.state(), ConnectionState::Ready);
    assert_eq!(h.session.reconnects_scheduled(), 0);
    assert!(h.session.status().contains("no list was loaded"));
}

#[tokio::test]
async fn test_authentication_error_emits_token_expired_and_reconnects() {
    let mut h = ready_harness().await;

    h.session
        .handle_sdk_event(SdkEvent::AuthenticationError {
            message: "Invalid token scopes.".to_string(),
        })
        .await;

    assert_eq!(h.session.state(), ConnectionState::Reconnecting);
    assert_eq!(h.session.device_id(), None);
    assert!(drain(&mut h.signals).contains(&SessionSignal::TokenExpired));
}

#[tokio::test]
async fn test_connect_failure_schedules_reconnect() {
    let mut h = harness();
    h.sdk.log.lock().unwrap().connect_error = Some("socket closed".to_string());

    h.session.initialize("token").await.unwrap();

    assert_eq!(h.session.state(), ConnectionState::Reconnecting);
    assert_eq!(h.session.reconnects_scheduled(), 1);
    assert!(!h.session.has_player());
}

#[tokio::test]
async fn test_reconnect_backoff_grows_until_attempts_exhausted() {
    let policy = ReconnectPolicy {
        max_attempts: 2,
        ..ReconnectPolicy::default()
    };
    let mut h = harness_with(
        true,
        MemoryDeviceStore::default(),
        PlayerSettings {
            reconnect: policy,
            ..PlayerSettings::default()
        },
    );
    h.session.initialize("token").await.unwrap();

    let mut delays = vec![];
    for _ in 0..2 {
        let before = Instant::now();
        h.session
            .handle_sdk_event(SdkEvent::PlaybackError {
                message: "failed to connect".to_string(),
            })
            .await;
        let deadline = h.session.reconnect_deadline().unwrap();
        delays.push(deadline - before);
        h.session.fire_due(deadline).await;
        assert_eq!(h.session.state(), ConnectionState::AwaitingDevice);
    }

    assert!(delays[0] >= Duration::from_millis(3000) && delays[0] < Duration::from_millis(3500));
    assert!(delays[1] >= Duration::from_millis(6000) && delays[1] < Duration::from_millis(6500));

    drain(&mut h.signals);
    h.session
        .handle_sdk_event(SdkEvent::PlaybackError {
            message: "failed to connect".to_string(),
        })
        .await;
    assert_eq!(h.session.state(), ConnectionState::Failed);
    assert!(h.session.next_deadline().is_none());

    // Giving up reports the error once.
    let errors: Vec<_> = drain(&mut h.signals)
        .into_iter()
        .filter(|s| matches!(s, SessionSignal::Error(_)))
        .collect();
    assert_eq!(
        errors,
        vec![SessionSignal::Error(PlaybackError::Playback(
            "failed to connect".to_string()
        ))]
    );
}

#[tokio::test]
async fn test_ready_resets_reconnect_attempts() {
    let policy = ReconnectPolicy {
        max_attempts: 1,
        ..ReconnectPolicy::default()
    };
    let mut h = harness_with(
        true,
        MemoryDeviceStore::default(),
        PlayerSettings {
            reconnect: policy,
            ..PlayerSettings::default()
        },
    );
    h.session.initialize("token").await.unwrap();

    for round in 0..3 {
        h.session
            .handle_sdk_event(SdkEvent::PlaybackError {
                message: "no active device".to_string(),
            })
            .await;
        assert_eq!(h.session.state(), ConnectionState::Reconnecting, "round {}", round);
        let deadline = h.session.reconnect_deadline().unwrap();
        h.session.fire_due(deadline).await;
        h.session
            .handle_sdk_event(SdkEvent::Ready {
                device_id: format!("dev-{}", round),
            })
            .await;
        assert!(h.session.is_ready());
    }
}

#[tokio::test]
async fn test_not_found_then_failing_reconnects_exhaust_attempts() {
    let policy = ReconnectPolicy {
        max_attempts: 2,
        ..ReconnectPolicy::default()
    };
    let mut h = harness_with(
        true,
        MemoryDeviceStore::default(),
        PlayerSettings {
            reconnect: policy,
            ..PlayerSettings::default()
        },
    );
    h.session.initialize("token").await.unwrap();
    h.session
        .handle_sdk_event(SdkEvent::Ready {
            device_id: "abc".to_string(),
        })
        .await;
    drain(&mut h.signals);

    h.backend.reply_with(Err(CommandFailure::Status {
        status: 404,
        message: "Device not found".to_string(),
    }));
    let result = h.session.play("spotify:track:123", "").await;
    assert_eq!(result, Err(PlaybackError::TrackOrDeviceNotFound));

    // The device never comes back.
    h.sdk.log.lock().unwrap().connect_error = Some("socket closed".to_string());
    for _ in 0..2 {
        let deadline = h.session.reconnect_deadline().unwrap();
        h.session.fire_due(deadline).await;
    }

    assert_eq!(h.session.state(), ConnectionState::Failed);
    assert_eq!(h.session.reconnects_scheduled(), 2);
    assert!(h.session.next_deadline().is_none());
    assert_eq!(h.backend.commands().len(), 1);

    let connect_failure =
        PlaybackError::Playback("Failed to connect to Spotify: socket closed".to_string());
    let errors: Vec<_> = drain(&mut h.signals)
        .into_iter()
        .filter(|s| matches!(s, SessionSignal::Error(_)))
        .collect();
    assert_eq!(
        errors,
        vec![
            SessionSignal::Error(PlaybackError::TrackOrDeviceNotFound),
            SessionSignal::Error(connect_failure.clone()),
            SessionSignal::Error(connect_failure),
        ]
    );
}

#[tokio::test]
async fn test_updated_token_is_used_by_next_reconnect() {
    let mut h = harness();
    h.session.initialize("old-token").await.unwrap();

    h.session.update_token("new-token");
    h.session.update_token("   ");
    h.session
        .handle_sdk_event(SdkEvent::PlaybackError {
            message: "failed to connect".to_string(),
        })
        .await;
    let deadline = h.session.reconnect_deadline().unwrap();
    h.session.fire_due(deadline).await;

    assert_eq!(
        h.sdk.tokens(),
        vec!["old-token".to_string(), "new-token".to_string()]
    );
}

// ---- play ----

#[tokio::test]
async fn test_play_when_not_ready_sends_nothing() {
    let mut h = harness();
    h.session.initialize("token").await.unwrap();

    let result = h.session.play("spotify:track:123", "abc").await;

    assert_eq!(result, Err(PlaybackError::DeviceUnavailable));
    assert!(h.backend.commands().is_empty());
}

#[tokio::test]
async fn test_play_success_refreshes_now_playing() {
    let mut h = ready_harness().await;
    h.backend
        .set_playback(Some(playback_of(track("Harder", "Daft Punk"), true)));

    h.session.play("spotify:track:123", "abc").await.unwrap();

    let commands = h.backend.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].kind, CommandKind::PlayTrack);
    assert_eq!(commands[0].uri, "spotify:track:123");
    assert_eq!(commands[0].device_id, "abc");
    assert_eq!(h.backend.polls(), 1);

    let now_playing = h.session.now_playing().unwrap();
    assert_eq!(now_playing.track_name, "Harder");
    assert_eq!(now_playing.source, NowPlayingSource::Poll);
    assert_eq!(h.session.status(), "Playing: Harder by Daft Punk");
}

#[tokio::test]
async fn test_play_playlist_uses_own_device_when_target_empty() {
    let mut h = ready_harness().await;

    h.session.play("spotify:playlist:k1", "").await.unwrap();

    let commands = h.backend.commands();
    assert_eq!(commands[0].kind, CommandKind::PlayPlaylist);
    assert_eq!(commands[0].device_id, "abc");
}

#[tokio::test]
async fn test_play_not_found_schedules_single_reconnect() {
    let mut h = ready_harness().await;
    h.backend.reply_with(Err(CommandFailure::Status {
        status: 404,
        message: "Device not found".to_string(),
    }));

    let result = h.session.play("spotify:track:123", "abc").await;

    assert_eq!(result, Err(PlaybackError::TrackOrDeviceNotFound));
    assert_eq!(h.session.reconnects_scheduled(), 1);
    assert_eq!(h.session.state(), ConnectionState::Reconnecting);
    assert_eq!(h.session.device_id(), None);
    assert_eq!(h.backend.commands().len(), 1);
}

#[tokio::test]
async fn test_play_unauthorized_expires_session_without_retry() {
    let mut h = ready_harness().await;
    h.backend.reply_with(Err(CommandFailure::Status {
        status: 401,
        message: "Authorization failed".to_string(),
    }));

    let result = h.session.play("spotify:track:123", "abc").await;

    assert_eq!(result, Err(PlaybackError::SessionExpired));
    let signals = drain(&mut h.signals);
    assert!(signals.contains(&SessionSignal::TokenExpired));
    assert_eq!(h.backend.commands().len(), 1);
    assert_eq!(h.session.reconnects_scheduled(), 0);
    assert_eq!(h.session.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn test_play_upstream_and_network_errors_show_message() {
    let mut h = ready_harness().await;
    h.backend.reply_with(Err(CommandFailure::Status {
        status: 403,
        message: "Player command failed: Restriction violated".to_string(),
    }));
    h.backend
        .reply_with(Err(CommandFailure::Network("connection refused".to_string())));

    let first = h.session.play("spotify:track:123", "abc").await;
    assert_eq!(
        first,
        Err(PlaybackError::UpstreamError {
            message: "Player command failed: Restriction violated".to_string()
        })
    );
    assert!(h.session.status().contains("Restriction violated"));

    let second = h.session.play("spotify:track:123", "abc").await;
    assert_eq!(
        second,
        Err(PlaybackError::UpstreamError {
            message: "connection refused".to_string()
        })
    );
    assert!(h.session.status().contains("connection refused"));
    assert_eq!(h.backend.commands().len(), 2);
    assert_eq!(h.session.state(), ConnectionState::Ready);
}

// ---- transport ----

#[tokio::test]
async fn test_transport_without_player_is_noop() {
    let mut h = harness();

    h.session.pause().await;

    assert!(h.sdk.log.lock().unwrap().transports.is_empty());
}

#[tokio::test]
async fn test_transport_forwards_to_player() {
    let mut h = ready_harness().await;

    h.session.resume().await;
    h.session.pause().await;
    h.session.next_track().await;
    h.session.previous_track().await;

    assert_eq!(
        h.sdk.log.lock().unwrap().transports,
        vec![
            Transport::Resume,
            Transport::Pause,
            Transport::NextTrack,
            Transport::PreviousTrack
        ]
    );
    assert_eq!(h.backend.polls(), 0);
}

#[tokio::test]
async fn test_transport_failure_resyncs_now_playing() {
    let mut h = ready_harness().await;
    h.sdk.log.lock().unwrap().transport_error = Some("no list was loaded".to_string());
    h.backend
        .set_playback(Some(playback_of(track("Elsewhere", "Someone"), false)));

    h.session.next_track().await;

    assert_eq!(h.backend.polls(), 1);
    assert_eq!(h.session.status(), "Paused: Elsewhere by Someone");
    assert_eq!(h.session.state(), ConnectionState::Ready);
}

// ---- device status ----

#[tokio::test]
async fn test_check_device_status_requires_device() {
    let mut h = harness();

    assert_eq!(
        h.session.check_device_status().await,
        Err(PlaybackError::DeviceUnavailable)
    );
}

#[tokio::test]
async fn test_check_device_status_valid() {
    let mut h = ready_harness().await;
    h.backend
        .set_devices(DevicesReply::List(vec![device("abc", "Browser")]));

    assert_eq!(h.session.check_device_status().await, Ok(DeviceStatus::Valid));
    assert_eq!(h.session.device_id(), Some("abc"));
}

#[tokio::test]
async fn test_check_device_status_promotes_awaiting_device() {
    let mut h = ready_harness().await;
    h.session
        .handle_sdk_event(SdkEvent::NotReady {
            device_id: "abc".to_string(),
        })
        .await;
    h.backend
        .set_devices(DevicesReply::List(vec![device("abc", "Browser")]));

    assert_eq!(h.session.check_device_status().await, Ok(DeviceStatus::Valid));
    assert_eq!(h.session.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn test_check_device_status_missing_device_reinitializes() {
    let mut h = ready_harness().await;
    h.backend
        .set_devices(DevicesReply::List(vec![device("other", "Phone")]));

    let status = h.session.check_device_status().await;

    assert_eq!(status, Ok(DeviceStatus::Invalid));
    assert_eq!(h.session.device_id(), None);
    assert_eq!(h.store.get().await, None);
    assert_eq!(h.sdk.disconnects(), 1);
    assert_eq!(h.sdk.connects(), 2);
    assert_eq!(h.session.reconnects_scheduled(), 0);
    assert!(
        drain(&mut h.signals)
            .contains(&SessionSignal::StateChanged(ConnectionState::ConnectingSdk))
    );
}

#[tokio::test]
async fn test_check_device_status_unauthorized() {
    let mut h = ready_harness().await;
    h.backend.set_devices(DevicesReply::Unauthorized);

    assert_eq!(
        h.session.check_device_status().await,
        Err(PlaybackError::SessionExpired)
    );
    assert!(drain(&mut h.signals).contains(&SessionSignal::TokenExpired));
}

// ---- now playing ----

#[tokio::test]
async fn test_refresh_without_playback_keeps_view() {
    let mut h = ready_harness().await;
    h.session
        .handle_sdk_event(SdkEvent::PlayerStateChanged(Some(sdk_state(
            Some(track("Harder", "Daft Punk")),
            false,
        ))))
        .await;

    let now_playing = h.session.refresh_now_playing().await;

    assert_eq!(now_playing.unwrap().track_name, "Harder");
    assert_eq!(h.session.status(), "Playing: Harder by Daft Punk");
}

#[tokio::test]
async fn test_player_state_updates_window_and_status() {
    let mut h = ready_harness().await;

    h.session
        .handle_sdk_event(SdkEvent::PlayerStateChanged(Some(sdk_state(
            Some(track("Harder", "Daft Punk")),
            true,
        ))))
        .await;

    assert_eq!(h.session.status(), "Paused: Harder by Daft Punk");
    let window = h.session.window();
    assert_eq!(window.entries.len(), 4);
    assert_eq!(window.title(), Some("K: Evening - 4 tracks".to_string()));
    assert_eq!(window.current().unwrap().name, "Harder");
    assert_eq!(window.entries[0].name, "Before");

    let now_playing = h.session.now_playing().unwrap();
    assert_eq!(now_playing.source, NowPlayingSource::Sdk);
    assert_eq!(now_playing.position_ms, 5_000);

    let signals = drain(&mut h.signals);
    assert!(
        signals
            .iter()
            .any(|s| matches!(s, SessionSignal::PlayerStateChanged(_)))
    );
    assert!(
        signals
            .iter()
            .any(|s| matches!(s, SessionSignal::TrackChanged(np) if np.track_name == "Harder"))
    );
}

#[tokio::test]
async fn test_status_line_names_first_artist() {
    let mut h = ready_harness().await;
    let mut duet = track("Duet", "First");
    duet.artists.push(SimpleArtist {
        id: None,
        name: "Second".to_string(),
    });

    h.session
        .handle_sdk_event(SdkEvent::PlayerStateChanged(Some(sdk_state(
            Some(duet.clone()),
            false,
        ))))
        .await;
    assert_eq!(h.session.status(), "Playing: Duet by First");
    assert_eq!(
        h.session.now_playing().unwrap().artist_names,
        vec!["First".to_string(), "Second".to_string()]
    );

    h.backend.set_playback(Some(playback_of(duet, false)));
    h.session.refresh_now_playing().await;
    assert_eq!(h.session.status(), "Paused: Duet by First");
}

#[tokio::test]
async fn test_player_state_without_track_falls_back() {
    let mut h = ready_harness().await;

    h.session
        .handle_sdk_event(SdkEvent::PlayerStateChanged(Some(sdk_state(None, false))))
        .await;
    assert_eq!(h.session.status(), "No track playing");

    h.session
        .handle_sdk_event(SdkEvent::PlayerStateChanged(Some(sdk_state(
            Some(track("Harder", "Daft Punk")),
            false,
        ))))
        .await;
    h.session
        .handle_sdk_event(SdkEvent::PlayerStateChanged(Some(sdk_state(None, true))))
        .await;

    assert_eq!(h.session.status(), "Paused: Harder by Daft Punk");
    assert!(h.session.now_playing().is_none());
}

#[tokio::test]
async fn test_last_write_wins_between_sdk_and_poll() {
    let mut h = ready_harness().await;

    h.session
        .handle_sdk_event(SdkEvent::PlayerStateChanged(Some(sdk_state(
            Some(track("Local", "A")),
            false,
        ))))
        .await;
    h.backend
        .set_playback(Some(playback_of(track("Remote", "B"), true)));
    h.session.refresh_now_playing().await;

    let now_playing = h.session.now_playing().unwrap();
    assert_eq!(now_playing.track_name, "Remote");
    assert_eq!(now_playing.source, NowPlayingSource::Poll);

    h.session
        .handle_sdk_event(SdkEvent::PlayerStateChanged(Some(sdk_state(
            Some(track("Local", "A")),
            false,
        ))))
        .await;
    assert_eq!(h.session.now_playing().unwrap().source, NowPlayingSource::Sdk);
    assert_eq!(h.session.status(), "Playing: Local by A");
}

#[test]
fn test_sdk_player_state_from_json() {
    let json = r#"{
        "paused": false,
        "position": 1234,
        "duration": 200000,
        "context": { "uri": "spotify:playlist:x", "metadata": { "name": "K: Road" } },
        "track_window": {
            "current_track": {
                "id": "t1",
                "uri": "spotify:track:t1",
                "name": "One",
                "duration_ms": 200000,
                "artists": [{ "name": "Band", "uri": "spotify:artist:b" }],
                "album": { "name": "Album", "images": [{ "url": "https://img/large" }, { "url": "https://img/small" }] }
            },
            "previous_tracks": [],
            "next_tracks": []
        }
    }"#;

    let state: SdkPlayerState = serde_json::from_str(json).unwrap();
    let window = TrackWindow::from_state(&state);

    assert_eq!(window.title(), Some("K: Road - 1 tracks".to_string()));
    let current = window.current().unwrap();
    assert_eq!(current.artist, "Band");
    assert_eq!(current.duration, "3:20");
    assert_eq!(current.image_url.as_deref(), Some("https://img/small"));
}

// ---- errors and backoff ----

#[test]
fn test_signal_event_names() {
    let now_playing = NowPlaying::from_poll(&playback_of(track("Harder", "Daft Punk"), true))
        .unwrap();
    let names: Vec<_> = [
        SessionSignal::SdkReady,
        SessionSignal::Ready {
            device_id: "abc".to_string(),
        },
        SessionSignal::NotReady {
            device_id: "abc".to_string(),
        },
        SessionSignal::Error(PlaybackError::TokenMissing),
        SessionSignal::PlayerStateChanged(TrackWindow::default()),
        SessionSignal::TrackChanged(now_playing),
        SessionSignal::TokenExpired,
        SessionSignal::StateChanged(ConnectionState::Ready),
    ]
    .iter()
    .map(SessionSignal::event_name)
    .collect();

    assert_eq!(
        names,
        vec![
            "spotify:sdk:ready",
            "spotify:ready",
            "spotify:notReady",
            "spotify:error",
            "spotify:playerStateChanged",
            "spotify:trackChanged",
            "spotify:tokenExpired",
            "spotify:stateChanged",
        ]
    );
}

#[test]
fn test_transient_patterns() {
    assert!(is_transient_playback_error("Request failed with 404"));
    assert!(is_transient_playback_error("Device Not Found"));
    assert!(is_transient_playback_error("No active device found"));
    assert!(is_transient_playback_error("DEVICE_NOT_FOUND"));
    assert!(is_transient_playback_error("Failed to connect"));
    assert!(!is_transient_playback_error("Restriction violated"));
}

#[test]
fn test_error_kinds() {
    assert_eq!(PlaybackError::TokenMissing.kind(), "token_missing");
    assert_eq!(PlaybackError::SdkLoadTimeout.kind(), "sdk_load");
    assert_eq!(PlaybackError::DeviceUnavailable.kind(), "device");
    assert!(PlaybackError::AccountError("x".to_string()).is_fatal());
    assert!(!PlaybackError::SessionExpired.is_fatal());
}

#[test]
fn test_backoff_delays() {
    let policy = ReconnectPolicy::default();
    let delays: Vec<u64> = (1..=7)
        .map(|n| policy.delay(n).as_millis() as u64)
        .collect();

    assert_eq!(delays, vec![3000, 6000, 12000, 24000, 48000, 60000, 60000]);
    assert_eq!(policy.delay(40), Duration::from_secs(60));
    assert!(policy.allows(10));
    assert!(!policy.allows(11));
}

#[test]
fn test_fixed_backoff_is_unlimited() {
    let policy = ReconnectPolicy::fixed(Duration::from_millis(3000));

    assert_eq!(policy.delay(1), Duration::from_millis(3000));
    assert_eq!(policy.delay(9), Duration::from_millis(3000));
    assert!(policy.allows(10_000));
}

#[test]
fn test_command_for_uri() {
    assert_eq!(
        PlaybackCommand::for_uri("spotify:track:1", "d").kind,
        CommandKind::PlayTrack
    );
    assert_eq!(
        PlaybackCommand::for_uri("spotify:album:1", "d").kind,
        CommandKind::PlayPlaylist
    );
    assert_eq!(CommandKind::PlayPlaylist.path(), "/play_playlist");
}

// ---- driver ----

#[tokio::test]
async fn test_driver_processes_events_and_commands() {
    let h = harness();
    let (events, event_rx) = mpsc::unbounded_channel();
    let (handle, commands) = SessionHandle::channel(8);

    let script = async {
        handle.initialize("token").await.unwrap();
        events
            .send(SdkEvent::Ready {
                device_id: "abc".to_string(),
            })
            .unwrap();

        let mut snapshot = handle.snapshot().await.unwrap();
        for _ in 0..50 {
            if snapshot.state == ConnectionState::Ready {
                break;
            }
            tokio::task::yield_now().await;
            snapshot = handle.snapshot().await.unwrap();
        }

        let played = handle.play("spotify:track:1", "").await;
        handle.shutdown().await;
        (snapshot, played)
    };

    let (session, (snapshot, played)) =
        tokio::join!(run_session(h.session, event_rx, commands), script);

    assert_eq!(snapshot.state, ConnectionState::Ready);
    assert_eq!(snapshot.device_id.as_deref(), Some("abc"));
    assert_eq!(played, Ok(()));
    assert_eq!(session.backend().commands().len(), 1);
    assert_eq!(h.store.load().await, Some("abc".to_string()));
}

#[tokio::test]
async fn test_driver_fires_sdk_load_deadline() {
    let h = harness_with(
        false,
        MemoryDeviceStore::default(),
        PlayerSettings {
            sdk_load_timeout: Duration::from_millis(30),
            ..PlayerSettings::default()
        },
    );
    let (_events, event_rx) = mpsc::unbounded_channel();
    let (handle, commands) = SessionHandle::channel(8);

    let script = async {
        handle.initialize("token").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let snapshot = handle.snapshot().await.unwrap();
        handle.shutdown().await;
        snapshot
    };

    let (_session, snapshot) = tokio::join!(run_session(h.session, event_rx, commands), script);

    assert_eq!(snapshot.state, ConnectionState::Failed);
    assert_eq!(snapshot.status, PlaybackError::SdkLoadTimeout.to_string());
}

#[tokio::test]
async fn test_driver_fires_reconnect_deadline() {
    let h = harness_with(
        true,
        MemoryDeviceStore::default(),
        PlayerSettings {
            reconnect: ReconnectPolicy::fixed(Duration::from_millis(20)),
            ..PlayerSettings::default()
        },
    );
    let sdk = h.sdk.clone();
    let (events, event_rx) = mpsc::unbounded_channel();
    let (handle, commands) = SessionHandle::channel(8);

    let script = async {
        handle.initialize("token").await.unwrap();
        events
            .send(SdkEvent::PlaybackError {
                message: "no active device".to_string(),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let snapshot = handle.snapshot().await.unwrap();
        handle.shutdown().await;
        snapshot
    };

    let (session, snapshot) = tokio::join!(run_session(h.session, event_rx, commands), script);

    assert_eq!(snapshot.state, ConnectionState::AwaitingDevice);
    assert_eq!(sdk.connects(), 2);
    assert_eq!(session.reconnects_scheduled(), 1);
}

#[tokio::test]
async fn test_driver_reconnects_with_refreshed_token() {
    let h = harness_with(
        true,
        MemoryDeviceStore::default(),
        PlayerSettings {
            reconnect: ReconnectPolicy::fixed(Duration::from_millis(20)),
            ..PlayerSettings::default()
        },
    );
    let sdk = h.sdk.clone();
    let expiries = h.session.subscribe();
    let (events, event_rx) = mpsc::unbounded_channel();
    let (handle, commands) = SessionHandle::channel(8);

    let mut refreshes = 0;
    let refresh = move || {
        refreshes += 1;
        let token = format!("fresh-token-{}", refreshes);
        async move { Some(token) }
    };

    let script = async {
        handle.initialize("old-token").await.unwrap();
        events
            .send(SdkEvent::AuthenticationError {
                message: "Invalid token scopes.".to_string(),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let snapshot = handle.snapshot().await.unwrap();
        handle.shutdown().await;
        snapshot
    };

    let (_session, snapshot, ()) = tokio::join!(
        run_session(h.session, event_rx, commands),
        script,
        refresh_on_token_expired(&handle, expiries, refresh),
    );

    assert_eq!(snapshot.state, ConnectionState::AwaitingDevice);
    assert_eq!(
        sdk.tokens(),
        vec!["old-token".to_string(), "fresh-token-1".to_string()]
    );
}

#[tokio::test]
async fn test_failed_token_refresh_keeps_current_token() {
    let h = harness_with(
        true,
        MemoryDeviceStore::default(),
        PlayerSettings {
            reconnect: ReconnectPolicy::fixed(Duration::from_millis(20)),
            ..PlayerSettings::default()
        },
    );
    let sdk = h.sdk.clone();
    let expiries = h.session.subscribe();
    let (events, event_rx) = mpsc::unbounded_channel();
    let (handle, commands) = SessionHandle::channel(8);

    let script = async {
        handle.initialize("old-token").await.unwrap();
        events
            .send(SdkEvent::AuthenticationError {
                message: "Invalid token scopes.".to_string(),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await;
    };

    tokio::join!(
        run_session(h.session, event_rx, commands),
        script,
        refresh_on_token_expired(&handle, expiries, || async { None }),
    );

    assert_eq!(
        sdk.tokens(),
        vec!["old-token".to_string(), "old-token".to_string()]
    );
}

#[tokio::test]
async fn test_handle_after_shutdown() {
    let h = harness();
    let (_events, event_rx) = mpsc::unbounded_channel();
    let (handle, commands) = SessionHandle::channel(8);

    handle.shutdown().await;
    let _session = run_session(h.session, event_rx, commands).await;

    assert!(handle.snapshot().await.is_none());
    assert_eq!(
        handle.play("spotify:track:1", "").await,
        Err(PlaybackError::DeviceUnavailable)
    );
}
