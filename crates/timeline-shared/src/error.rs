use thiserror::Error;

/// Authentication failures.  The display strings are shown to end users
/// verbatim, so they are fixed and deliberately vague.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("This username is already taken")]
    NameTaken,

    #[error("Password should be at least 6 characters")]
    WeakPassword,

    #[error("Invalid login code")]
    InvalidLoginCode,

    #[error("User not found in database.")]
    ProfileMissing,

    #[error("Too many failed attempts. Please try again later.")]
    TooManyAttempts,

    #[error("Please enter a username")]
    EmptyName,

    #[error("Not signed in")]
    NotSignedIn,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty path segment")]
    EmptySegment,

    #[error("Path segment too long: {0} bytes")]
    TooLong(usize),

    #[error("Invalid character {ch:?} in path segment {segment:?}")]
    InvalidChar { segment: String, ch: char },
}
