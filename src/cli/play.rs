use std::time::Duration;

use tokio::{
    sync::{broadcast, mpsc},
    time::timeout,
};

use super::common::{access_token, resolve_user};
use crate::{
    config::Settings,
    error, info,
    management::{FileDeviceStore, TokenStore},
    playback::{
        ConnectionState, DirectBackend, PlaybackError, PlaybackSession, RemoteDeviceSdk,
        SessionHandle, SessionSignal, SessionSnapshot, refresh_on_token_expired, run_session,
    },
    spotify::SpotifyClient,
    success, warning,
};

const READY_TIMEOUT: Duration = Duration::from_secs(15);

/// Plays `uri` on the Connect device named `device` through a playback
/// session, the same path the browser player takes.
pub async fn play(settings: Settings, uri: &str, device: &str, user: Option<String>) {
    let tokens = TokenStore::new(settings.data_dir.clone());
    let spotify = SpotifyClient::new(settings.spotify.clone());
    let uid = resolve_user(&tokens, user).await;
    let token = access_token(&tokens, &spotify, &uid).await;

    let (events, event_rx) = mpsc::unbounded_channel();
    let session = PlaybackSession::new(
        RemoteDeviceSdk::new(spotify.clone(), device, events),
        DirectBackend::new(spotify.clone(), tokens.clone(), &uid),
        FileDeviceStore::new(settings.data_dir.clone()),
        settings.player.clone(),
    );
    let signals = session.subscribe();
    let expiries = session.subscribe();
    let (handle, commands) = SessionHandle::channel(16);

    let script = async {
        let outcome = drive(&handle, signals, &token, uri).await;
        let snapshot = handle.snapshot().await;
        handle.shutdown().await;
        (outcome, snapshot)
    };

    let renew = || renew_token(&tokens, &spotify, &uid);

    let (_session, (outcome, snapshot), ()) = tokio::join!(
        run_session(session, event_rx, commands),
        script,
        refresh_on_token_expired(&handle, expiries, renew),
    );

    match outcome {
        Ok(()) => {
            success!("Playing {} on {}", uri, device);
            if let Some(SessionSnapshot { status, .. }) = snapshot {
                info!("{}", status);
            }
        }
        Err(e) => error!("Cannot play {} on {}: {} ({})", uri, device, e, e.kind()),
    }
}

async fn renew_token(tokens: &TokenStore, spotify: &SpotifyClient, uid: &str) -> Option<String> {
    match tokens.renew_access_token(spotify, uid).await {
        Ok(token) => Some(token),
        Err(e) => {
            warning!("Cannot refresh Spotify token for {}: {}", uid, e);
            None
        }
    }
}

async fn drive(
    handle: &SessionHandle,
    mut signals: broadcast::Receiver<SessionSignal>,
    token: &str,
    uri: &str,
) -> Result<(), PlaybackError> {
    handle.initialize(token).await?;

    let ready = timeout(READY_TIMEOUT, async {
        loop {
            match signals.recv().await {
                Ok(SessionSignal::Ready { .. }) => return Ok(()),
                Ok(SessionSignal::Error(e)) if e.is_fatal() => return Err(e),
                Ok(SessionSignal::StateChanged(ConnectionState::Failed)) => {
                    return Err(PlaybackError::DeviceUnavailable);
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(PlaybackError::DeviceUnavailable);
                }
            }
        }
    })
    .await;

    match ready {
        Ok(result) => result?,
        Err(_) => return Err(PlaybackError::DeviceUnavailable),
    }

    handle.play(uri, "").await
}
