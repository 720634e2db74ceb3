/// Application name
pub const APP_NAME: &str = "Faculty History";

/// Public chronological listing, keyed by entry id.
pub const YEARS: &str = "years";

/// Per-user index of entries, keyed by user id.
pub const USER_ENTRIES: &str = "userEntries";

/// User profiles; each profile owns an `entries` child.
pub const USERS: &str = "users";

/// Child of `users/{uid}` holding the user's single editable entry.
pub const PERSONAL_ENTRY: &str = "entries";

/// Registration codes, grouped by the role they grant.
pub const LOGIN_CODES: &str = "logincodes";

/// Minimum accepted password length on sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Domain appended to login names to form the informative profile email.
pub const EMAIL_DOMAIN: &str = "example.com";

/// Maximum length of a single path segment in bytes.
pub const MAX_KEY_LEN: usize = 768;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;
