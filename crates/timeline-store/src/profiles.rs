//! User profiles and registration codes kept in the keyed store.

use serde_json::Value;

use timeline_shared::{Role, StorePath, UserId};

use crate::error::Result;
use crate::keyed::KeyedStore;
use crate::models::UserProfile;
use crate::timeline::Timeline;

impl<S: KeyedStore> Timeline<S> {
    pub fn profile(&self, user: &UserId) -> Result<Option<UserProfile>> {
        self.store()
            .read(&StorePath::user_profile(user)?)?
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .transpose()
    }

    pub fn put_profile(&self, user: &UserId, profile: &UserProfile) -> Result<()> {
        self.store()
            .write(&StorePath::user_profile(user)?, &serde_json::to_value(profile)?)
    }

    /// All readable profiles, ordered by user id.
    pub fn profiles(&self) -> Result<Vec<(UserId, UserProfile)>> {
        let rows = self.store().children(&StorePath::users())?;
        let mut out = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            match serde_json::from_value::<UserProfile>(value) {
                Ok(profile) => out.push((UserId(key), profile)),
                Err(e) => tracing::warn!(user = %key, error = %e, "skipping unreadable profile"),
            }
        }
        Ok(out)
    }

    /// Role granted by a registration code.  Codes are upper-cased; admin
    /// codes are checked first.
    pub fn login_code_role(&self, code: &str) -> Result<Option<Role>> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Ok(None);
        }
        for role in [Role::Admin, Role::User] {
            let Ok(path) = StorePath::login_code(role, &code) else {
                return Ok(None);
            };
            if self.store().read(&path)?.is_some_and(|v| is_truthy(&v)) {
                return Ok(Some(role));
            }
        }
        Ok(None)
    }

    pub fn seed_login_code(&self, role: Role, code: &str) -> Result<()> {
        let path = StorePath::login_code(role, &code.trim().to_uppercase())?;
        self.store().write(&path, &Value::Bool(true))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
