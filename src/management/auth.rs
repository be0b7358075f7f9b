use std::path::PathBuf;

use thiserror::Error;

use crate::{
    info,
    spotify::{ApiError, SpotifyClient},
    types::{SpotifyProfile, Token, UserRecord},
    utils,
};

/// Seconds before expiry at which a token already counts as expired.
const EXPIRY_MARGIN_SECS: u64 = 240;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unknown user {0}")]
    UnknownUser(String),
    #[error("token refresh failed: {0}")]
    Refresh(#[from] ApiError),
}

/// File-backed store of signed-in users and their OAuth tokens.
///
/// Layout below `root`:
/// - `users/<uid>.json`: one [`UserRecord`] per user
/// - `last_user`: uid of the most recent login, used by the CLI
#[derive(Debug, Clone)]
pub struct TokenStore {
    root: PathBuf,
}

impl TokenStore {
    pub fn new(root: PathBuf) -> Self {
        TokenStore { root }
    }

    pub async fn load(&self, uid: &str) -> Result<UserRecord, StoreError> {
        let content = match async_fs::read_to_string(self.user_path(uid)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::UnknownUser(uid.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn persist(&self, record: &UserRecord) -> Result<(), StoreError> {
        let path = self.user_path(&record.uid);
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(record)?;
        async_fs::write(path, json).await?;
        Ok(())
    }

    /// Creates or updates the record for `profile` after a successful login.
    pub async fn from_oauth(
        &self,
        profile: &SpotifyProfile,
        token: Token,
    ) -> Result<UserRecord, StoreError> {
        let now = utils::now_secs();
        let record = match self.load(&profile.id).await {
            Ok(mut existing) => {
                existing.token = token;
                existing.display_name = profile.display_name.clone();
                existing.updated_at = now;
                existing
            }
            Err(StoreError::UnknownUser(_)) => UserRecord {
                uid: profile.id.clone(),
                display_name: profile.display_name.clone(),
                token,
                created_at: now,
                updated_at: now,
            },
            Err(e) => return Err(e),
        };

        self.persist(&record).await?;
        self.remember_last_user(&record.uid).await?;
        Ok(record)
    }

    /// Access token for `uid`, refreshed and persisted first if it expired.
    pub async fn fresh_access_token(
        &self,
        client: &SpotifyClient,
        uid: &str,
    ) -> Result<String, StoreError> {
        let record = self.load(uid).await?;
        if !Self::is_expired(&record.token, utils::now_secs()) {
            return Ok(record.token.access_token);
        }
        Ok(self.refresh(client, record).await?.token.access_token)
    }

    /// Refreshes `uid`'s token whatever its recorded expiry says, for when
    /// upstream already rejected it.
    pub async fn renew_access_token(
        &self,
        client: &SpotifyClient,
        uid: &str,
    ) -> Result<String, StoreError> {
        let record = self.load(uid).await?;
        Ok(self.refresh(client, record).await?.token.access_token)
    }

    pub async fn refresh(
        &self,
        client: &SpotifyClient,
        mut record: UserRecord,
    ) -> Result<UserRecord, StoreError> {
        if record.token.refresh_token.is_empty() {
            return Err(StoreError::Refresh(ApiError::Unauthorized(
                "no refresh token stored".to_string(),
            )));
        }

        info!("Refreshing Spotify token for {}", record.uid);
        record.token = client.refresh_token(&record.token.refresh_token).await?;
        record.updated_at = utils::now_secs();
        self.persist(&record).await?;
        Ok(record)
    }

    pub fn is_expired(token: &Token, now: u64) -> bool {
        now + EXPIRY_MARGIN_SECS >= token.expires_at()
    }

    pub async fn last_user(&self) -> Result<Option<String>, StoreError> {
        match async_fs::read_to_string(self.root.join("last_user")).await {
            Ok(uid) => Ok(Some(uid.trim().to_string()).filter(|u| !u.is_empty())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remember_last_user(&self, uid: &str) -> Result<(), StoreError> {
        async_fs::create_dir_all(&self.root).await?;
        async_fs::write(self.root.join("last_user"), uid).await?;
        Ok(())
    }

    fn user_path(&self, uid: &str) -> PathBuf {
        let safe: String = uid
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join("users").join(format!("{}.json", safe))
    }
}
