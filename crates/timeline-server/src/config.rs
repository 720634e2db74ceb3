//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use timeline_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT};
use timeline_store::ConsistencyMode;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `None` (platform data directory).
    pub database_path: Option<PathBuf>,

    /// How multi-location writes are committed.
    /// Env: `WRITE_MODE` (`atomic` / `independent`)
    /// Default: `atomic`
    pub write_mode: ConsistencyMode,

    /// Registration codes granting the admin role.
    /// Env: `ADMIN_LOGIN_CODES` (comma-separated)
    pub admin_login_codes: Vec<String>,

    /// Registration codes granting the user role.
    /// Env: `USER_LOGIN_CODES` (comma-separated)
    pub user_login_codes: Vec<String>,

    /// Session lifetime in seconds.
    /// Env: `SESSION_TTL_SECS`
    /// Default: `86400`
    pub session_ttl_secs: u64,

    /// Sign-in attempts allowed per login name per minute.
    /// Env: `LOGIN_ATTEMPTS_PER_MINUTE`
    /// Default: `5`
    pub login_attempts_per_minute: u32,

    /// Human-readable name for this instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Faculty History"`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            write_mode: ConsistencyMode::Atomic,
            admin_login_codes: Vec::new(),
            user_login_codes: Vec::new(),
            session_ttl_secs: 24 * 60 * 60,
            login_attempts_per_minute: 5,
            instance_name: APP_NAME.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(mode) = std::env::var("WRITE_MODE") {
            match mode.parse() {
                Ok(parsed) => config.write_mode = parsed,
                Err(e) => tracing::warn!(error = %e, "Invalid WRITE_MODE, using atomic"),
            }
        }

        if let Ok(codes) = std::env::var("ADMIN_LOGIN_CODES") {
            config.admin_login_codes = parse_codes(&codes);
        }

        if let Ok(codes) = std::env::var("USER_LOGIN_CODES") {
            config.user_login_codes = parse_codes(&codes);
        }

        if let Ok(val) = std::env::var("SESSION_TTL_SECS") {
            match val.parse::<u64>() {
                Ok(n) if n > 0 => config.session_ttl_secs = n,
                _ => tracing::warn!(value = %val, "Invalid SESSION_TTL_SECS, using default"),
            }
        }

        if let Ok(val) = std::env::var("LOGIN_ATTEMPTS_PER_MINUTE") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.login_attempts_per_minute = n,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid LOGIN_ATTEMPTS_PER_MINUTE, using default"
                ),
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Split a comma-separated code list, dropping blanks.  Codes are matched
/// upper-cased.
fn parse_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert_eq!(config.write_mode, ConsistencyMode::Atomic);
        assert!(config.admin_login_codes.is_empty());
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!(parse_codes(" abc, ,DEF ,"), vec!["ABC", "DEF"]);
        assert!(parse_codes("").is_empty());
    }
}
