//! Sign-up, sign-in and principal tracking.
//!
//! Credentials live in the `accounts` table; role and display name come
//! from the profile at `users/{uid}`.  Passwords are hashed with Argon2id
//! and compared in constant time.

use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use chrono::Utc;
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use timeline_shared::constants::{EMAIL_DOMAIN, MIN_PASSWORD_LEN};
use timeline_shared::{AuthError, UserId};
use timeline_store::{Account, Database, StoreError, Timeline, UserProfile};

use crate::error::ServerError;
use crate::rate_limit::RateLimiter;
use crate::session::{Principal, SessionStore};

pub type SharedTimeline = Arc<Mutex<Timeline<Database>>>;

/// Principal changes, for listeners that track who is signed in.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Principal),
    SignedOut(Principal),
    /// All sessions of the user were revoked.
    Revoked(UserId),
}

/// A freshly opened session.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub token: String,
    pub principal: Principal,
}

#[derive(Clone)]
pub struct AuthService {
    timeline: SharedTimeline,
    sessions: SessionStore,
    attempts: RateLimiter<String>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthService {
    pub fn new(timeline: SharedTimeline, sessions: SessionStore, attempts_per_minute: u32) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            timeline,
            sessions,
            attempts: RateLimiter::per_minute(attempts_per_minute),
            events,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn attempts(&self) -> &RateLimiter<String> {
        &self.attempts
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Register a new account.  The login code decides the role.
    pub async fn sign_up(
        &self,
        name: &str,
        secret: &str,
        login_code: &str,
    ) -> Result<SignedIn, ServerError> {
        let name = normalize_name(name)?;
        if secret.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword.into());
        }

        let role = {
            let timeline = self.timeline.lock().await;
            timeline
                .login_code_role(login_code)?
                .ok_or(AuthError::InvalidLoginCode)?
        };

        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let password_hash = hash_blocking(secret.to_string(), salt).await?;

        let account = Account {
            user_id: UserId::generate(),
            name: name.clone(),
            password_hash,
            salt,
            created_at: Utc::now(),
        };
        let profile = UserProfile {
            name: name.clone(),
            role,
            email: Some(format!("{name}@{EMAIL_DOMAIN}")),
            created_at: Some(account.created_at),
        };

        {
            let timeline = self.timeline.lock().await;
            let db = timeline.store();
            match db.create_account(&account) {
                Ok(()) => {}
                Err(StoreError::Conflict(_)) => return Err(AuthError::NameTaken.into()),
                Err(e) => return Err(e.into()),
            }
            if let Err(e) = timeline.put_profile(&account.user_id, &profile) {
                // No profile means the account could never sign in.
                if let Err(cleanup) = db.delete_account(&account.user_id) {
                    warn!(user = %account.user_id, error = %cleanup, "Failed to roll back account");
                }
                return Err(e.into());
            }
        }

        info!(user = %account.user_id, name = %name, role = %role, "Account created");

        let principal = Principal {
            user_id: account.user_id,
            name,
            role,
        };
        Ok(self.open_session(principal).await)
    }

    pub async fn sign_in(&self, name: &str, secret: &str) -> Result<SignedIn, ServerError> {
        let name = normalize_name(name)?;
        // Only failed attempts are charged; a spent bucket blocks every try.
        if self.attempts.is_exhausted(&name).await {
            warn!(name = %name, "Sign-in throttled");
            return Err(AuthError::TooManyAttempts.into());
        }

        let found = {
            let timeline = self.timeline.lock().await;
            match timeline.store().get_account_by_name(&name) {
                Ok(account) => Some(account),
                Err(StoreError::NotFound) => None,
                Err(e) => return Err(e.into()),
            }
        };
        let Some(account) = found else {
            warn!(name = %name, "Sign-in for unknown name");
            return Err(self.failed_attempt(name).await);
        };

        let computed = hash_blocking(secret.to_string(), account.salt).await?;
        if !bool::from(computed.ct_eq(&account.password_hash)) {
            warn!(name = %name, "Sign-in with wrong password");
            return Err(self.failed_attempt(name).await);
        }

        let profile = {
            let timeline = self.timeline.lock().await;
            timeline.profile(&account.user_id)?
        };
        let Some(profile) = profile else {
            warn!(user = %account.user_id, "Account has no profile");
            return Err(AuthError::ProfileMissing.into());
        };

        let principal = Principal {
            user_id: account.user_id,
            name: profile.name,
            role: profile.role,
        };
        info!(user = %principal.user_id, "Signed in");
        Ok(self.open_session(principal).await)
    }

    /// Close a session.  Unknown tokens are ignored.
    pub async fn sign_out(&self, token: &str) {
        if let Some(principal) = self.sessions.remove(token).await {
            info!(user = %principal.user_id, "Signed out");
            let _ = self.events.send(AuthEvent::SignedOut(principal));
        }
    }

    pub async fn current_principal(&self, token: &str) -> Result<Principal, ServerError> {
        self.sessions
            .get(token)
            .await
            .ok_or_else(|| AuthError::NotSignedIn.into())
    }

    /// Forget a user's credentials and end their sessions.  The caller is
    /// responsible for the user's stored data.
    pub async fn remove_user(&self, user: &UserId) -> Result<(), ServerError> {
        let deleted = {
            let timeline = self.timeline.lock().await;
            timeline.store().delete_account(user)?
        };
        let revoked = self.sessions.revoke_user(user).await;
        info!(user = %user, account = deleted, sessions = revoked, "Credentials removed");
        let _ = self.events.send(AuthEvent::Revoked(user.clone()));
        Ok(())
    }

    async fn failed_attempt(&self, name: String) -> ServerError {
        self.attempts.check(name).await;
        AuthError::InvalidCredentials.into()
    }

    async fn open_session(&self, principal: Principal) -> SignedIn {
        let token = self.sessions.create(principal.clone()).await;
        // Nobody listening is fine.
        let _ = self.events.send(AuthEvent::SignedIn(principal.clone()));
        SignedIn { token, principal }
    }
}

fn normalize_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(AuthError::EmptyName);
    }
    Ok(name)
}

fn hash_password(secret: &[u8], salt: &[u8; 16]) -> Result<[u8; 32], argon2::Error> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    let mut out = [0u8; 32];
    argon2.hash_password_into(secret, salt, &mut out)?;
    Ok(out)
}

async fn hash_blocking(secret: String, salt: [u8; 16]) -> Result<[u8; 32], ServerError> {
    tokio::task::spawn_blocking(move || hash_password(secret.as_bytes(), &salt))
        .await
        .map_err(|e| ServerError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| ServerError::Internal(format!("password hashing failed: {e}")))
}
