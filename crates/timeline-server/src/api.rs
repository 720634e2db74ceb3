use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use timeline_shared::{AuthError, EntryId, Role, UserId, Year};
use timeline_store::{Database, DeleteOutcome, Entry, ListedEntry, Timeline};

use crate::auth::{AuthService, SharedTimeline, SignedIn};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::session::{Principal, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub timeline: SharedTimeline,
    pub auth: AuthService,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire up the synchronizer and auth over `db`, seeding the configured
    /// registration codes.
    pub fn new(config: ServerConfig, db: Database) -> Result<Self, ServerError> {
        let timeline = Timeline::new(db, config.write_mode);
        for code in &config.admin_login_codes {
            timeline.seed_login_code(Role::Admin, code)?;
        }
        for code in &config.user_login_codes {
            timeline.seed_login_code(Role::User, code)?;
        }

        let timeline = Arc::new(Mutex::new(timeline));
        let auth = AuthService::new(
            timeline.clone(),
            SessionStore::new(config.session_ttl_secs),
            config.login_attempts_per_minute,
        );

        Ok(Self {
            timeline,
            auth,
            rate_limiter: RateLimiter::default(),
            config: Arc::new(config),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/timeline", get(timeline_listing))
        .route("/years", get(years_listing))
        .route("/auth/signup", post(sign_up))
        .route("/auth/login", post(sign_in))
        .route("/auth/logout", post(sign_out))
        .route("/auth/me", get(current_user))
        .route("/me/entry", get(my_entry).put(submit_my_entry))
        .route("/admin/entries", post(admin_add_entry))
        .route(
            "/admin/entries/:id",
            put(admin_edit_entry).delete(admin_delete_entry),
        )
        .route("/admin/users", get(admin_list_users))
        .route("/admin/users/:id", axum::routing::delete(admin_delete_user))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest {
    name: String,
    password: String,
    login_code: String,
}

#[derive(Deserialize)]
struct SignInRequest {
    name: String,
    password: String,
}

#[derive(Serialize)]
struct SessionResponse {
    token: String,
    user: Principal,
}

impl From<SignedIn> for SessionResponse {
    fn from(signed_in: SignedIn) -> Self {
        Self {
            token: signed_in.token,
            user: signed_in.principal,
        }
    }
}

#[derive(Deserialize)]
struct EntryRequest {
    year: Year,
    description: String,
}

#[derive(Deserialize)]
struct EditRequest {
    #[serde(default)]
    year: Option<Year>,
    description: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedEntryResponse {
    id: EntryId,
    created: bool,
    entry: Entry,
    message: &'static str,
}

#[derive(Serialize)]
struct UpdatedEntryResponse {
    entry: Entry,
    message: &'static str,
}

#[derive(Serialize)]
struct DeletedEntryResponse {
    message: &'static str,
    removed: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserSummary {
    id: UserId,
    name: String,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedUserResponse {
    message: &'static str,
    entries_removed: usize,
}

#[derive(Serialize)]
struct SignedOutResponse {
    signed_out: bool,
}

// ---------------------------------------------------------------------------
// Session helpers
// ---------------------------------------------------------------------------

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get("authorization")?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn require_principal(state: &AppState, headers: &HeaderMap) -> Result<Principal, ServerError> {
    let token = bearer_token(headers).ok_or(AuthError::NotSignedIn)?;
    state.auth.current_principal(token).await
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Principal, ServerError> {
    let principal = require_principal(state, headers).await?;
    if !principal.role.is_admin() {
        return Err(ServerError::Forbidden);
    }
    Ok(principal)
}

// ---------------------------------------------------------------------------
// Public handlers
// ---------------------------------------------------------------------------

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        name: state.config.instance_name.clone(),
    })
}

async fn timeline_listing(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListedEntry>>, ServerError> {
    let timeline = state.timeline.lock().await;
    Ok(Json(timeline.merged_listing()?))
}

async fn years_listing(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListedEntry>>, ServerError> {
    let timeline = state.timeline.lock().await;
    Ok(Json(timeline.years_listing()?))
}

// ---------------------------------------------------------------------------
// Auth handlers
// ---------------------------------------------------------------------------

async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<Json<SessionResponse>, ServerError> {
    let signed_in = state
        .auth
        .sign_up(&req.name, &req.password, &req.login_code)
        .await?;
    Ok(Json(signed_in.into()))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, ServerError> {
    let signed_in = state.auth.sign_in(&req.name, &req.password).await?;
    Ok(Json(signed_in.into()))
}

async fn sign_out(headers: HeaderMap, State(state): State<AppState>) -> Json<SignedOutResponse> {
    if let Some(token) = bearer_token(&headers) {
        state.auth.sign_out(token).await;
    }
    Json(SignedOutResponse { signed_out: true })
}

async fn current_user(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Principal>, ServerError> {
    Ok(Json(require_principal(&state, &headers).await?))
}

// ---------------------------------------------------------------------------
// Personal entry
// ---------------------------------------------------------------------------

async fn my_entry(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Entry>, ServerError> {
    let principal = require_principal(&state, &headers).await?;
    let timeline = state.timeline.lock().await;
    timeline
        .personal_entry(&principal.user_id)?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound("You have not written an entry yet".into()))
}

async fn submit_my_entry(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<EntryRequest>,
) -> Result<Json<SavedEntryResponse>, ServerError> {
    let principal = require_principal(&state, &headers).await?;
    let outcome = {
        let timeline = state.timeline.lock().await;
        timeline.submit_entry(&principal.user_id, &principal.name, req.year, &req.description)?
    };

    Ok(Json(SavedEntryResponse {
        id: outcome.entry_id,
        created: outcome.created,
        entry: outcome.entry,
        message: "Entry saved successfully!",
    }))
}

// ---------------------------------------------------------------------------
// Admin handlers
// ---------------------------------------------------------------------------

async fn admin_add_entry(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<EntryRequest>,
) -> Result<Json<SavedEntryResponse>, ServerError> {
    let admin = require_admin(&state, &headers).await?;
    let (id, entry) = {
        let timeline = state.timeline.lock().await;
        timeline.add_entry(&admin.name, req.year, &req.description)?
    };

    Ok(Json(SavedEntryResponse {
        id,
        created: true,
        entry,
        message: "Entry added successfully",
    }))
}

async fn admin_edit_entry(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EditRequest>,
) -> Result<Json<UpdatedEntryResponse>, ServerError> {
    let admin = require_admin(&state, &headers).await?;
    let entry = {
        let timeline = state.timeline.lock().await;
        timeline.edit_entry(&EntryId::from(id.as_str()), req.year, &req.description)?
    };
    info!(admin = %admin.user_id, entry = %id, "Entry edited");

    Ok(Json(UpdatedEntryResponse {
        entry,
        message: "Entry updated successfully",
    }))
}

async fn admin_delete_entry(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedEntryResponse>, ServerError> {
    let admin = require_admin(&state, &headers).await?;
    let outcome = {
        let timeline = state.timeline.lock().await;
        timeline.delete_entry(&EntryId::from(id.as_str()))?
    };
    info!(admin = %admin.user_id, entry = %id, "Entry removed");

    let response = match outcome {
        DeleteOutcome::YearsOnly => DeletedEntryResponse {
            message: "Entry deleted from years collection",
            removed: vec![format!("years/{id}")],
        },
        DeleteOutcome::AllCollections { removed, .. } => DeletedEntryResponse {
            message: "Entry successfully deleted from all collections",
            removed: removed.iter().map(ToString::to_string).collect(),
        },
    };
    Ok(Json(response))
}

async fn admin_list_users(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserSummary>>, ServerError> {
    require_admin(&state, &headers).await?;
    let timeline = state.timeline.lock().await;
    let users = timeline
        .profiles()?
        .into_iter()
        .map(|(id, profile)| UserSummary {
            id,
            name: profile.name,
            role: profile.role,
            email: profile.email,
        })
        .collect();
    Ok(Json(users))
}

async fn admin_delete_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedUserResponse>, ServerError> {
    let admin = require_admin(&state, &headers).await?;
    let user = UserId::from(id.as_str());
    if user == admin.user_id {
        return Err(ServerError::BadRequest(
            "You cannot delete your own account".into(),
        ));
    }

    let outcome = {
        let timeline = state.timeline.lock().await;
        if timeline.profile(&user)?.is_none() {
            return Err(ServerError::NotFound("User not found".into()));
        }
        timeline.delete_user(&user)?
    };
    state.auth.remove_user(&user).await?;
    info!(admin = %admin.user_id, user = %user, "User removed");

    Ok(Json(DeletedUserResponse {
        message: "User and all associated entries deleted successfully",
        entries_removed: outcome.entries_removed,
    }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
