//! Domain model structs persisted in the keyed store.
//!
//! Field names follow the camelCase layout of the stored JSON documents so
//! rows written by earlier clients keep deserializing.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use timeline_shared::{Role, UserId, Year};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One historical-year record.  The same document shape lives at
/// `years/{id}`, `userEntries/{uid}` and `users/{uid}/entries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub year: Year,
    /// Serialized HTML fragment.
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Absent on admin-authored rows and on the personal copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flexible_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Entry {
    /// `true` when the displayed fields agree, ignoring write timing and
    /// the ownership link.
    pub fn same_content(&self, other: &Entry) -> bool {
        self.year.label() == other.year.label()
            && self.description == other.description
            && self.user_name == other.user_name
    }
}

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

/// Profile document at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Lower-cased login name, also used as the display name.
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flexible_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Credential record backing sign-in.  Never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: UserId,
    pub name: String,
    /// Argon2id output.
    pub password_hash: [u8; 32],
    pub salt: [u8; 16],
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Accept RFC-3339 strings as well as the millisecond numbers some older
/// rows carry.
fn flexible_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Millis(ms)) => Ok(Utc.timestamp_millis_opt(ms).single()),
        Some(Raw::Text(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}
