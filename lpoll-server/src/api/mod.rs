//! Public API handlers.
//!
//! # Endpoints
//!
//! - `POST /getAccessToken?channel_id=..&secret=..` – issue a channel token
//! - `GET  /getUpdates?token=..&offset=..&limit=..` – long-poll for events

use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use lpoll_core::processors::PollError;
use lpoll_sdk::objects::ErrorResponse;
use lpoll_sdk::token::TokenError;

use crate::state::AppState;

mod access_token;
mod updates;

/// Build the public API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/getAccessToken", post(access_token::get_access_token))
        .route("/getUpdates", get(updates::get_updates))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in API handlers.
#[derive(Debug)]
pub(crate) enum ApiError {
    /// A required query parameter is missing or empty.
    MissingParameter(&'static str),
    /// The access secret does not match.
    InvalidSecret,
    /// The token is malformed, forged or expired.
    InvalidToken(TokenError),
    /// Signing a new token failed.
    TokenIssue(TokenError),
    /// The long-poll could not complete.
    Poll(PollError),
}

fn error_body(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::MissingParameter(name) => {
                error_body(StatusCode::BAD_REQUEST, format!("{name} is required"))
            }
            ApiError::InvalidSecret => error_body(StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::InvalidToken(e) => {
                tracing::warn!(error = %e, "Rejected access token");
                error_body(StatusCode::UNAUTHORIZED, "Invalid or expired token")
            }
            ApiError::TokenIssue(e) => {
                tracing::error!(error = %e, "Failed to issue access token");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate token")
            }
            ApiError::Poll(PollError::Canceled) => {
                error_body(StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down")
            }
            ApiError::Poll(PollError::Upstream(e)) => {
                tracing::error!(error = %e, "Failed to fetch events");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch events")
            }
        }
    }
}

/// Treat an absent or blank parameter as missing.
fn required(value: Option<String>, name: &'static str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ApiError::MissingParameter(name))
}
