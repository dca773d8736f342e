use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use kanau::processor::Processor;
use lpoll_core::processors::LongPoll;
use lpoll_sdk::objects::GetUpdatesResponse;
use serde::Deserialize;
use tokio::time::Instant;

use super::{ApiError, required};
use crate::state::AppState;

/// Query of `/getUpdates`.
///
/// Numbers are taken as strings so a bad value falls back to its default
/// instead of rejecting the request.
#[derive(Debug, Deserialize)]
pub(super) struct UpdatesParams {
    token: Option<String>,
    offset: Option<String>,
    limit: Option<String>,
}

impl UpdatesParams {
    fn offset(&self) -> i64 {
        self.offset
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Oversized values saturate so the pool clamps them to its maximum.
    fn limit(&self, default: u32) -> u32 {
        self.limit
            .as_deref()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|limit| *limit >= 1)
            .map_or(default, |limit| u32::try_from(limit).unwrap_or(u32::MAX))
    }
}

/// `GET /getUpdates`: long-poll a channel for events after `offset`.
///
/// Answers as soon as events exist, or with an empty list once the poll
/// timeout passes. If the client goes away the handler future is dropped,
/// which cancels the poll and any backend call it has in flight.
pub(super) async fn get_updates(
    State(state): State<AppState>,
    Query(params): Query<UpdatesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let offset = params.offset();
    let limit = params.limit(state.poll.default_limit);
    let token = required(params.token, "token")?;
    let channel_id = state
        .tokens
        .validate(&token)
        .map_err(ApiError::InvalidToken)?;

    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let outcome = state
        .coordinator
        .process(LongPoll {
            channel_id,
            offset,
            limit,
            deadline: Instant::now() + state.poll.timeout,
            cancel,
        })
        .await
        .map_err(ApiError::Poll)?;

    Ok(Json(GetUpdatesResponse {
        events: outcome.into_events(),
    }))
}
