use std::future::Future;

use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{Instant, sleep_until},
};

use super::{
    backend::PlaybackBackend,
    error::PlaybackError,
    events::{SdkEvent, SessionSignal},
    sdk::{PlayerSdk, Transport},
    session::PlaybackSession,
    state::{ConnectionState, DeviceStatus, NowPlaying, TrackWindow},
};
use crate::management::DeviceStore;

/// Point-in-time copy of the session's view.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub device_id: Option<String>,
    pub now_playing: Option<NowPlaying>,
    pub window: TrackWindow,
    pub status: String,
}

pub enum SessionCommand {
    Initialize {
        token: String,
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    UpdateToken {
        token: String,
    },
    Play {
        uri: String,
        device_id: String,
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    Transport {
        action: Transport,
        reply: oneshot::Sender<()>,
    },
    CheckDeviceStatus {
        reply: oneshot::Sender<Result<DeviceStatus, PlaybackError>>,
    },
    RefreshNowPlaying {
        reply: oneshot::Sender<Option<NowPlaying>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown,
}

/// Cloneable front end of a session driven by [`run_session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// A handle plus the command receiver to pass to [`run_session`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SessionCommand>) {
        let (commands, receiver) = mpsc::channel(capacity);
        (Self { commands }, receiver)
    }

    pub async fn initialize(&self, token: &str) -> Result<(), PlaybackError> {
        let token = token.to_string();
        self.request(|reply| SessionCommand::Initialize { token, reply })
            .await
            .unwrap_or(Err(PlaybackError::DeviceUnavailable))
    }

    pub async fn update_token(&self, token: &str) {
        let _ = self
            .commands
            .send(SessionCommand::UpdateToken {
                token: token.to_string(),
            })
            .await;
    }

    pub async fn play(&self, uri: &str, device_id: &str) -> Result<(), PlaybackError> {
        let (uri, device_id) = (uri.to_string(), device_id.to_string());
        self.request(|reply| SessionCommand::Play {
            uri,
            device_id,
            reply,
        })
        .await
        .unwrap_or(Err(PlaybackError::DeviceUnavailable))
    }

    pub async fn transport(&self, action: Transport) {
        let _ = self
            .request(|reply| SessionCommand::Transport { action, reply })
            .await;
    }

    pub async fn resume(&self) {
        self.transport(Transport::Resume).await
    }

    pub async fn pause(&self) {
        self.transport(Transport::Pause).await
    }

    pub async fn previous_track(&self) {
        self.transport(Transport::PreviousTrack).await
    }

    pub async fn next_track(&self) {
        self.transport(Transport::NextTrack).await
    }

    pub async fn check_device_status(&self) -> Result<DeviceStatus, PlaybackError> {
        self.request(|reply| SessionCommand::CheckDeviceStatus { reply })
            .await
            .unwrap_or(Err(PlaybackError::DeviceUnavailable))
    }

    pub async fn refresh_now_playing(&self) -> Option<NowPlaying> {
        self.request(|reply| SessionCommand::RefreshNowPlaying { reply })
            .await
            .flatten()
    }

    /// `None` once the driver has stopped.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        self.request(|reply| SessionCommand::Snapshot { reply })
            .await
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
    }

    /// Resolves once the driver has stopped.
    pub async fn closed(&self) {
        self.commands.closed().await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Option<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.ok()?;
        response.await.ok()
    }
}

/// Drives `session` until [`SessionHandle::shutdown`] or until every handle is
/// dropped, then hands the session back.
///
/// SDK events, commands and the session's own deadlines are processed one at a
/// time on the calling task; nothing here needs to be `Send`.
pub async fn run_session<S, B, D>(
    mut session: PlaybackSession<S, B, D>,
    mut events: mpsc::UnboundedReceiver<SdkEvent>,
    mut commands: mpsc::Receiver<SessionCommand>,
) -> PlaybackSession<S, B, D>
where
    S: PlayerSdk,
    B: PlaybackBackend,
    D: DeviceStore,
{
    loop {
        let deadline = session.next_deadline();
        tokio::select! {
            Some(event) = events.recv() => session.handle_sdk_event(event).await,
            command = commands.recv() => match command {
                Some(SessionCommand::Shutdown) | None => break,
                Some(command) => handle_command(&mut session, command).await,
            },
            _ = sleep_until_deadline(deadline) => session.fire_due(Instant::now()).await,
        }
    }
    session
}

/// Answers every `TokenExpired` signal with a token from `refresh` and hands
/// it to the session, so the next reconnect uses it. Returns when the driver
/// stops. A `None` from `refresh` keeps the current token.
pub async fn refresh_on_token_expired<F, Fut>(
    handle: &SessionHandle,
    mut signals: broadcast::Receiver<SessionSignal>,
    mut refresh: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<String>>,
{
    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Ok(SessionSignal::TokenExpired) => {
                    if let Some(token) = refresh().await {
                        handle.update_token(&token).await;
                    }
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = handle.closed() => break,
        }
    }
}

async fn handle_command<S, B, D>(session: &mut PlaybackSession<S, B, D>, command: SessionCommand)
where
    S: PlayerSdk,
    B: PlaybackBackend,
    D: DeviceStore,
{
    match command {
        SessionCommand::Initialize { token, reply } => {
            let _ = reply.send(session.initialize(&token).await);
        }
        SessionCommand::UpdateToken { token } => session.update_token(&token),
        SessionCommand::Play {
            uri,
            device_id,
            reply,
        } => {
            let _ = reply.send(session.play(&uri, &device_id).await);
        }
        SessionCommand::Transport { action, reply } => {
            session.transport(action).await;
            let _ = reply.send(());
        }
        SessionCommand::CheckDeviceStatus { reply } => {
            let _ = reply.send(session.check_device_status().await);
        }
        SessionCommand::RefreshNowPlaying { reply } => {
            let _ = reply.send(session.refresh_now_playing().await);
        }
        SessionCommand::Snapshot { reply } => {
            let _ = reply.send(SessionSnapshot {
                state: session.state(),
                device_id: session.device_id().map(str::to_string),
                now_playing: session.now_playing().cloned(),
                window: session.window().clone(),
                status: session.status().to_string(),
            });
        }
        SessionCommand::Shutdown => {}
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
