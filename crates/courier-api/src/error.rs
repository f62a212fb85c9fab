use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Every failure a handler can produce, mapped onto one HTTP status each.
/// Store failures keep their cause for the log but reach the client as a
/// generic 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Username already taken")]
    DuplicateUser,

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid user/password")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Internal server error")]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateUser | Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Storage(cause) = &self {
            // The cause stays in the log; the client sees the generic
            // Display message only.
            error!("storage error: {cause:#}");
        }

        let status = self.status();
        let body = json!({
            "error": {
                "message": self.to_string(),
                "status": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}
