use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{types::PendingLogin, utils};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "syft_session";

/// Pending logins older than this are dropped.
const LOGIN_TTL_SECS: u64 = 600;

/// Server-side sessions: cookie value → user id, plus the PKCE verifiers of
/// logins waiting for their callback.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, String>>>,
    pending: Arc<Mutex<HashMap<String, PendingLogin>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session for `uid` and returns the cookie value.
    pub async fn create(&self, uid: &str) -> String {
        let session_id = utils::generate_random_string(48);
        self.sessions
            .lock()
            .await
            .insert(session_id.clone(), uid.to_string());
        session_id
    }

    pub async fn user(&self, session_id: &str) -> Option<String> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }

    /// Remembers `code_verifier` and returns the OAuth `state` it is kept under.
    pub async fn start_login(&self, code_verifier: String) -> String {
        let state = utils::generate_random_string(32);
        let now = utils::now_secs();
        let mut pending = self.pending.lock().await;
        pending.retain(|_, login| now.saturating_sub(login.created_at) < LOGIN_TTL_SECS);
        pending.insert(
            state.clone(),
            PendingLogin {
                code_verifier,
                created_at: now,
            },
        );
        state
    }

    /// Single use: the login is removed whether or not it is still fresh.
    pub async fn take_login(&self, state: &str) -> Option<PendingLogin> {
        let login = self.pending.lock().await.remove(state)?;
        (utils::now_secs().saturating_sub(login.created_at) < LOGIN_TTL_SECS).then_some(login)
    }
}
