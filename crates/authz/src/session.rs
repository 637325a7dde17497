//! In-process session store backing the credentials login.

use std::collections::HashMap;

use devevent_kernel::settings::{AuthSettings, UserCredentials};
use serde::Serialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::{Timestamp, Uuid};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("missing bearer token")]
    MissingToken,

    #[error("session is invalid or expired")]
    InvalidSession,
}

/// A logged-in dashboard user.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub username: String,
    pub name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

/// Issues and resolves bearer sessions for the configured accounts.
pub struct SessionStore {
    users: Vec<UserCredentials>,
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(settings: &AuthSettings) -> Self {
        if settings.users.is_empty() {
            tracing::warn!("no dashboard users configured; every login will be rejected");
        }

        Self {
            users: settings.users.clone(),
            ttl: Duration::seconds(i64::try_from(settings.session_ttl_secs).unwrap_or(i64::MAX)),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Check credentials and open a new session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let user = self
            .users
            .iter()
            .find(|u| u.username == username && u.password == password)
            .ok_or(AuthError::InvalidCredentials)?;

        let now = OffsetDateTime::now_utc();
        let session = Session {
            token: Uuid::new_v7(Timestamp::now(uuid::NoContext)).to_string(),
            username: user.username.clone(),
            name: user.name.clone(),
            expires_at: now.saturating_add(self.ttl),
        };

        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());

        tracing::info!(username = %session.username, "session opened");
        Ok(session)
    }

    /// Look up a live session. Expired sessions are evicted on the way.
    pub async fn resolve(&self, token: &str) -> Option<Session> {
        let now = OffsetDateTime::now_utc();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                None => return None,
                Some(session) if !session.is_expired(now) => return Some(session.clone()),
                Some(_) => {}
            }
        }

        self.sessions.write().await.remove(token);
        tracing::debug!("expired session evicted");
        None
    }

    /// Close a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Drop every expired session, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }
}
