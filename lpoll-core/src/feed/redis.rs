//! Redis pub/sub notification feed.

use super::{FeedError, FeedStream, NotificationFeed};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::debug;

/// Default topic the backend publishes notifications on.
pub const DEFAULT_TOPIC: &str = "longpoll:events";

/// Subscribes to one Redis pub/sub channel.
///
/// Every [`connect`](NotificationFeed::connect) opens a dedicated pub/sub
/// connection; the returned stream ends when Redis closes it.
pub struct RedisFeed {
    client: redis::Client,
    topic: String,
}

impl RedisFeed {
    /// Create a feed for `topic` on the Redis server at `url`
    /// (e.g. `redis://:password@redis:6379/0`).
    ///
    /// No connection is made until the first `connect`.
    pub fn new(url: &str, topic: impl Into<String>) -> Result<Self, FeedError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            topic: topic.into(),
        })
    }
}

#[async_trait]
impl NotificationFeed for RedisFeed {
    async fn connect(&self) -> Result<FeedStream, FeedError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.topic).await?;
        debug!(topic = %self.topic, "Redis subscription confirmed");

        let stream = pubsub
            .into_on_message()
            .map(|msg| Bytes::copy_from_slice(msg.get_payload_bytes()));
        Ok(stream.boxed())
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}
