//! Slash-separated hierarchical keys into the keyed store.
//!
//! A [`StorePath`] is always non-empty and every segment is validated, so a
//! path built from user input can never escape its collection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    LOGIN_CODES, MAX_KEY_LEN, PERSONAL_ENTRY, USERS, USER_ENTRIES, YEARS,
};
use crate::error::PathError;
use crate::types::{EntryId, Role, UserId};

/// Characters that are never allowed inside a segment.
const FORBIDDEN: &[char] = &['/', '.', '#', '$', '[', ']'];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorePath(String);

impl StorePath {
    /// Parse a full path such as `users/abc/entries`.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(PathError::EmptySegment);
        }
        for segment in trimmed.split('/') {
            validate_segment(segment)?;
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Path to a direct child of `self`.
    pub fn child(&self, key: &str) -> Result<Self, PathError> {
        validate_segment(key)?;
        Ok(Self(format!("{}/{}", self.0, key)))
    }

    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| Self(parent.to_string()))
    }

    /// Last segment of the path.
    pub fn key(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if `other` lies strictly below `self`.
    pub fn is_ancestor_of(&self, other: &StorePath) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    // ------------------------------------------------------------------
    // Well-known locations
    // ------------------------------------------------------------------

    pub fn years() -> Self {
        Self(YEARS.to_string())
    }

    pub fn user_entries() -> Self {
        Self(USER_ENTRIES.to_string())
    }

    pub fn users() -> Self {
        Self(USERS.to_string())
    }

    /// `years/{entryId}`
    pub fn year_entry(id: &EntryId) -> Result<Self, PathError> {
        Self::years().child(id.as_str())
    }

    /// `userEntries/{userId}`
    pub fn user_entry(user: &UserId) -> Result<Self, PathError> {
        Self::user_entries().child(user.as_str())
    }

    /// `users/{userId}`
    pub fn user_profile(user: &UserId) -> Result<Self, PathError> {
        Self::users().child(user.as_str())
    }

    /// `users/{userId}/entries`
    pub fn personal_entry(user: &UserId) -> Result<Self, PathError> {
        Self::user_profile(user)?.child(PERSONAL_ENTRY)
    }

    /// `logincodes/{role}/{code}`
    pub fn login_code(role: Role, code: &str) -> Result<Self, PathError> {
        Self(LOGIN_CODES.to_string())
            .child(role.as_str())?
            .child(code)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StorePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StorePath> for String {
    fn from(path: StorePath) -> Self {
        path.0
    }
}

fn validate_segment(segment: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment);
    }
    if segment.len() > MAX_KEY_LEN {
        return Err(PathError::TooLong(segment.len()));
    }
    if let Some(ch) = segment
        .chars()
        .find(|c| FORBIDDEN.contains(c) || c.is_control())
    {
        return Err(PathError::InvalidChar {
            segment: segment.to_string(),
            ch,
        });
    }
    Ok(())
}
