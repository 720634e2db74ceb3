//! # timeline-server
//!
//! HTTP backend for the faculty history timeline.
//!
//! This binary provides:
//! - **Entry synchronization** across `years`, `userEntries` and
//!   `users/{uid}/entries`, backed by SQLite
//! - **REST API** (axum) for the public timeline, personal entries and the
//!   admin page
//! - **Accounts and sessions** with registration codes deciding the role
//! - **Per-IP and per-name rate limiting** to protect against abuse

mod api;
mod auth;
mod config;
mod error;
mod rate_limit;
mod session;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use timeline_store::Database;

use crate::api::AppState;
use crate::auth::AuthEvent;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,timeline_server=debug,timeline_store=debug")
        }))
        .init();

    info!("Starting timeline server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        instance = %config.instance_name,
        write_mode = %config.write_mode,
        admin_codes = config.admin_login_codes.len(),
        user_codes = config.user_login_codes.len(),
        "Instance settings"
    );

    // -----------------------------------------------------------------------
    // 3. Open the database and build application state
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            Database::open_at(path)?
        }
        None => Database::new()?,
    };

    let http_addr = config.http_addr;
    let app_state = AppState::new(config, db)?;

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = app_state.rate_limiter.clone();
    let attempts = app_state.auth.attempts().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(600.0).await;
            attempts.purge_stale(600.0).await;
        }
    });

    // Periodic session cleanup (every 10 minutes)
    let sessions = app_state.auth.sessions().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
        }
    });

    // Principal changes
    let mut events = app_state.auth.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(AuthEvent::SignedIn(p)) => debug!(user = %p.user_id, role = %p.role, "principal signed in"),
                Ok(AuthEvent::SignedOut(p)) => debug!(user = %p.user_id, "principal signed out"),
                Ok(AuthEvent::Revoked(user)) => debug!(user = %user, "principal revoked"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "auth event listener lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
