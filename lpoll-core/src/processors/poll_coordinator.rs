//! PollCoordinator processor.
//!
//! Implements one long-poll:
//!
//! 1. Fetch immediately; return right away if anything is there.
//! 2. Otherwise subscribe to the channel and wait for whichever comes
//!    first: a notification, the deadline, or cancellation.
//! 3. On a notification, fetch again and return that result, even if it is
//!    still empty. On the deadline, return an empty result. On
//!    cancellation, return nothing.
//!
//! The subscription is dropped (and so unsubscribed) on every exit path.
//! Upstream failures are returned as errors, never as an empty result.

use crate::fanout::FanoutRegistry;
use crate::upstream::{FetchEvents, UpstreamError, UpstreamPool};
use kanau::processor::Processor;
use lpoll_sdk::objects::Event;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A validated long-poll request.
#[derive(Debug, Clone)]
pub struct LongPoll {
    /// Channel the caller has been authorized for.
    pub channel_id: String,
    /// Only events after this id are returned.
    pub offset: i64,
    pub limit: u32,
    /// When to give up waiting and answer with an empty result.
    pub deadline: Instant,
    /// Canceled when the caller goes away.
    pub cancel: CancellationToken,
}

/// How a long-poll completed.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The immediate fetch found events.
    Ready(Vec<Event>),
    /// A notification arrived and the refetch returned these (maybe none).
    Refetched(Vec<Event>),
    /// The deadline passed without a notification.
    TimedOut,
}

impl PollOutcome {
    pub fn into_events(self) -> Vec<Event> {
        match self {
            PollOutcome::Ready(events) | PollOutcome::Refetched(events) => events,
            PollOutcome::TimedOut => Vec::new(),
        }
    }
}

/// Errors that end a long-poll without a result.
#[derive(Debug, Error)]
pub enum PollError {
    /// The backend could not be queried
    #[error("upstream error: {0}")]
    Upstream(UpstreamError),

    /// The caller canceled; nobody is waiting for an answer
    #[error("poll canceled")]
    Canceled,
}

impl From<UpstreamError> for PollError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Canceled => PollError::Canceled,
            other => PollError::Upstream(other),
        }
    }
}

/// Runs long-polls against the upstream pool and the fan-out registry.
///
/// Cloning is cheap; every poll is independent.
#[derive(Clone)]
pub struct PollCoordinator {
    pool: Arc<UpstreamPool>,
    registry: FanoutRegistry,
}

impl PollCoordinator {
    pub fn new(pool: Arc<UpstreamPool>, registry: FanoutRegistry) -> Self {
        Self { pool, registry }
    }

    pub fn pool(&self) -> &UpstreamPool {
        &self.pool
    }

    pub fn registry(&self) -> &FanoutRegistry {
        &self.registry
    }
}

impl Processor<LongPoll> for PollCoordinator {
    type Output = PollOutcome;
    type Error = PollError;

    #[tracing::instrument(skip_all, name = "LongPoll", fields(channel_id = %poll.channel_id, offset = poll.offset))]
    async fn process(&self, poll: LongPoll) -> Result<PollOutcome, PollError> {
        let query = FetchEvents {
            channel_id: poll.channel_id,
            offset: poll.offset,
            limit: poll.limit,
        };

        let events = self
            .pool
            .fetch(&query, Some(poll.deadline), &poll.cancel)
            .await?;
        if !events.is_empty() {
            debug!(count = events.len(), "Returning immediate events");
            return Ok(PollOutcome::Ready(events));
        }

        let mut subscription = self.registry.subscribe(&query.channel_id);

        tokio::select! {
            biased;

            _ = poll.cancel.cancelled() => {
                debug!("Poll canceled while waiting");
                Err(PollError::Canceled)
            }

            notification = subscription.recv() => {
                drop(subscription);
                if let Some(notification) = notification {
                    debug!(event_id = notification.event_id, "Notification received, refetching");
                }

                let events = self.pool.fetch(&query, None, &poll.cancel).await?;
                Ok(PollOutcome::Refetched(events))
            }

            _ = tokio::time::sleep_until(poll.deadline) => {
                debug!("Poll timed out");
                Ok(PollOutcome::TimedOut)
            }
        }
    }
}
