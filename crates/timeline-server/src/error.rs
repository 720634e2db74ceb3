use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use timeline_shared::AuthError;
use timeline_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: Admin privileges required")]
    Forbidden,

    /// One step of a multi-location operation failed; earlier steps stay.
    #[error("{0}")]
    StepFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("Entry not found".into()),
            StoreError::InvalidYear(_) | StoreError::Validation(_) | StoreError::Path(_) => {
                ServerError::BadRequest(e.to_string())
            }
            StoreError::PartialWrite { .. } => ServerError::StepFailed(e.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Auth(e) => (auth_status(e), self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::StepFailed(_) => {
                tracing::error!(error = %self, "multi-location operation failed part-way");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ServerError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong. Please try again.".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn auth_status(e: &AuthError) -> StatusCode {
    match e {
        AuthError::InvalidCredentials | AuthError::NotSignedIn => StatusCode::UNAUTHORIZED,
        AuthError::NameTaken => StatusCode::CONFLICT,
        AuthError::WeakPassword | AuthError::InvalidLoginCode | AuthError::EmptyName => {
            StatusCode::BAD_REQUEST
        }
        AuthError::ProfileMissing => StatusCode::NOT_FOUND,
        AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
    }
}
