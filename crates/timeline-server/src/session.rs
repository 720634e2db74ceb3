//! Server-side sessions.
//!
//! A session maps an opaque bearer token to the signed-in [`Principal`].
//! Entries expire after the configured TTL and are purged periodically.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use timeline_shared::{Role, UserId};

/// The identity attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: UserId,
    /// Display name, also written as `userName` on submitted entries.
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
struct Session {
    principal: Principal,
    expires_at: DateTime<Utc>,
}

impl Session {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Clone)]
pub struct SessionStore {
    /// token -> session
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::days(1));
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Open a session and return its bearer token.
    pub async fn create(&self, principal: Principal) -> String {
        let token = new_token();
        let session = Session {
            principal,
            expires_at: Utc::now() + self.ttl,
        };
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    pub async fn get(&self, token: &str) -> Option<Principal> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|s| s.is_fresh(Utc::now()))
            .map(|s| s.principal.clone())
    }

    pub async fn remove(&self, token: &str) -> Option<Principal> {
        self.sessions
            .write()
            .await
            .remove(token)
            .map(|s| s.principal)
    }

    /// Drop every session of `user`.  Returns how many were dropped.
    pub async fn revoke_user(&self, user: &UserId) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| &s.principal.user_id != user);
        before - sessions.len()
    }

    pub async fn purge_expired(&self) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.is_fresh(now));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, remaining = sessions.len(), "Purged expired sessions");
        }
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
