//! Notification feed.
//!
//! A [`NotificationFeed`] connects to the single pub/sub topic the backend
//! publishes on and yields raw message payloads. The connection is expected
//! to drop from time to time; reconnecting is the job of
//! [`FeedListener`](crate::processors::FeedListener), not of the feed.

mod redis;

pub use self::redis::{DEFAULT_TOPIC, RedisFeed};

use crate::events::NotificationEvent;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;

/// Stream of raw payloads from one feed connection.
///
/// The stream ends when the connection is lost.
pub type FeedStream = BoxStream<'static, Bytes>;

/// Errors that end a feed connection.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Redis client error
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// The message stream ended without a shutdown request
    #[error("notification feed disconnected")]
    Disconnected,
}

/// A single bad message on the feed. Never fatal.
#[derive(Debug, Error)]
#[error("malformed notification: {0}")]
pub struct MalformedNotification(#[from] serde_json::Error);

/// Source of notification payloads.
#[async_trait]
pub trait NotificationFeed: Send + Sync {
    /// Connect and subscribe to the notification topic.
    async fn connect(&self) -> Result<FeedStream, FeedError>;

    /// Name of the topic, for logging.
    fn topic(&self) -> &str;
}

#[async_trait]
impl<T: NotificationFeed + ?Sized> NotificationFeed for Arc<T> {
    async fn connect(&self) -> Result<FeedStream, FeedError> {
        (**self).connect().await
    }

    fn topic(&self) -> &str {
        (**self).topic()
    }
}

/// Parse a raw feed payload.
pub fn parse_notification(payload: &[u8]) -> Result<NotificationEvent, MalformedNotification> {
    Ok(serde_json::from_slice(payload)?)
}
