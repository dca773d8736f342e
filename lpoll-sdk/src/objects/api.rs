//! Request/response bodies of the relay's HTTP API and of the backend's
//! `getEvents` endpoint.

use super::Event;
use serde::{Deserialize, Serialize};

/// Body returned by the backend's `getEvents` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendEventsResponse {
    pub events: Vec<Event>,
    #[serde(default)]
    pub count: usize,
}

/// Body of a successful `GET /getUpdates`.
///
/// An empty `events` list means "nothing new yet, poll again".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUpdatesResponse {
    pub events: Vec<Event>,
}

/// Body of a successful `POST /getAccessToken`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub token: String,
}

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
