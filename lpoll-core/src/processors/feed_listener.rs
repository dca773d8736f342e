//! FeedListener processor.
//!
//! The FeedListener is responsible for:
//! - Connecting to the notification feed and reading it indefinitely
//! - Parsing each payload into a `NotificationEvent` (bad payloads are
//!   logged and skipped)
//! - Handing every notification to the `FanoutRegistry` delivery sweep
//! - Reconnecting with exponential backoff whenever the feed drops
//!
//! Only the shutdown signal stops it; a lost connection never does.

use crate::fanout::FanoutRegistry;
use crate::feed::{FeedError, NotificationFeed, parse_notification};
use crate::utils::backoff::{Backoff, BackoffPolicy};
use futures_util::StreamExt;
use kanau::processor::Processor;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Reads the notification feed and feeds the fan-out registry.
pub struct FeedListener<F> {
    feed: F,
    registry: FanoutRegistry,
    policy: BackoffPolicy,
}

impl<F: NotificationFeed> FeedListener<F> {
    pub fn new(feed: F, registry: FanoutRegistry, policy: BackoffPolicy) -> Self {
        Self {
            feed,
            registry,
            policy,
        }
    }

    /// Run until shutdown is signaled.
    ///
    /// Each connection is read until it ends; the listener then waits for
    /// the next backoff delay and reconnects. The delay doubles after each
    /// failure up to the policy ceiling and goes back to the base delay as
    /// soon as a connection succeeds.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(self.policy);
        info!(topic = self.feed.topic(), "FeedListener started");

        loop {
            match self.listen(&mut backoff, &mut shutdown_rx).await {
                Ok(()) => {
                    info!("FeedListener received shutdown signal");
                    break;
                }
                Err(e) => {
                    let retry_in = backoff.next_delay();
                    warn!(
                        topic = self.feed.topic(),
                        error = %e,
                        ?retry_in,
                        "Notification feed stopped, reconnecting"
                    );

                    tokio::select! {
                        biased;

                        _ = shutdown_requested(&mut shutdown_rx) => {
                            info!("FeedListener received shutdown signal while backing off");
                            break;
                        }

                        _ = tokio::time::sleep(retry_in) => {}
                    }
                }
            }
        }

        info!("FeedListener shutdown complete");
    }

    /// Read one connection until it ends (`Err`) or shutdown (`Ok`).
    async fn listen(
        &self,
        backoff: &mut Backoff,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<(), FeedError> {
        let mut stream = tokio::select! {
            biased;

            _ = shutdown_requested(shutdown_rx) => return Ok(()),

            stream = self.feed.connect() => stream?,
        };

        backoff.reset();
        info!(topic = self.feed.topic(), "Notification feed connected");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_requested(shutdown_rx) => return Ok(()),

                payload = stream.next() => match payload {
                    Some(payload) => self.handle_payload(&payload).await,
                    None => return Err(FeedError::Disconnected),
                },
            }
        }
    }

    async fn handle_payload(&self, payload: &[u8]) {
        let event = match parse_notification(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "Skipping malformed notification"
                );
                return;
            }
        };

        debug!(
            channel_id = %event.channel_id,
            event_id = event.event_id,
            "Received notification"
        );

        let Ok(delivered) = self.registry.process(event).await;
        if delivered > 0 {
            debug!(delivered, "Notification fanned out");
        }
    }
}

/// Resolves once shutdown is requested or the shutdown sender is gone.
async fn shutdown_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}
