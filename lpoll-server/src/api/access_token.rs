use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use lpoll_sdk::objects::AccessTokenResponse;
use serde::Deserialize;

use super::{ApiError, required};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct AccessTokenParams {
    channel_id: Option<String>,
    secret: Option<String>,
}

/// `POST /getAccessToken`: issue a token for one channel.
///
/// The caller proves it may hand out tokens by presenting the shared
/// access secret.
pub(super) async fn get_access_token(
    State(state): State<AppState>,
    Query(params): Query<AccessTokenParams>,
) -> Result<impl IntoResponse, ApiError> {
    let channel_id = required(params.channel_id, "channel_id")?;
    let secret = params.secret.unwrap_or_default();
    if !state.verify_access_secret(&secret) {
        tracing::warn!(%channel_id, "Access token requested with an invalid secret");
        return Err(ApiError::InvalidSecret);
    }

    let token = state
        .tokens
        .issue(&channel_id)
        .map_err(ApiError::TokenIssue)?;
    tracing::info!(%channel_id, "Issued access token");

    Ok(Json(AccessTokenResponse { token }))
}
