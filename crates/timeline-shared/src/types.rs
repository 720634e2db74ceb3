use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an account.  New accounts get a UUID v4 in simple form;
/// rows written by older clients may carry any opaque string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Key of a row in the `years` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    /// Entry ids are minted from the creation time in milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Millisecond value when the id was minted from a timestamp.
    pub fn millis(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The display label of an entry.
///
/// Stored data holds either JSON numbers or strings.  Sorting coerces the
/// label to a number; legacy de-duplication compares the string label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Year {
    Number(serde_json::Number),
    Text(String),
}

impl Year {
    /// Numeric value of the label, if it has a finite one.
    ///
    /// Surrounding whitespace in text labels is ignored; an empty label has
    /// no numeric value.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            Year::Number(n) => n.as_f64()?,
            Year::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok()?
            }
        };
        value.is_finite().then_some(value)
    }

    pub fn is_numeric(&self) -> bool {
        self.as_number().is_some()
    }

    /// String form used in composite de-duplication keys.
    pub fn label(&self) -> String {
        match self {
            Year::Number(n) => n.to_string(),
            Year::Text(s) => s.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Year::Text(s) if s.trim().is_empty())
    }

    /// Descending chronological order.  Labels without a numeric value sort
    /// after every numeric one and compare equal among themselves.
    pub fn cmp_descending(&self, other: &Year) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<i64> for Year {
    fn from(n: i64) -> Self {
        Year::Number(n.into())
    }
}

impl From<&str> for Year {
    fn from(s: &str) -> Self {
        Year::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_numeric_coercion() {
        assert_eq!(Year::from(2010).as_number(), Some(2010.0));
        assert_eq!(Year::from(" 1999 ").as_number(), Some(1999.0));
        assert_eq!(Year::from("").as_number(), None);
        assert_eq!(Year::from("the sixties").as_number(), None);
    }

    #[test]
    fn test_year_label_matches_across_representations() {
        assert_eq!(Year::from(2010).label(), Year::from("2010").label());
    }

    #[test]
    fn test_year_deserializes_from_number_or_string() {
        let n: Year = serde_json::from_str("2005").unwrap();
        let s: Year = serde_json::from_str("\"2005\"").unwrap();
        assert_eq!(n, Year::from(2005));
        assert_eq!(s, Year::from("2005"));
        assert_eq!(serde_json::to_string(&n).unwrap(), "2005");
    }

    #[test]
    fn test_cmp_descending_puts_text_last() {
        let mut years = vec![
            Year::from("unknown"),
            Year::from(2005),
            Year::from("2020"),
            Year::from(2010),
        ];
        years.sort_by(|a, b| a.cmp_descending(b));
        let labels: Vec<String> = years.iter().map(Year::label).collect();
        assert_eq!(labels, vec!["2020", "2010", "2005", "unknown"]);
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.to_string(), "user");
        assert!("root".parse::<Role>().is_err());
    }
}
