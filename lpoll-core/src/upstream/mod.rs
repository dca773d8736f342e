//! Upstream request pool.
//!
//! Every read of event data goes to the backend through an
//! [`UpstreamPool`], which bounds how many requests are in flight at once.
//! The pool is a pure passthrough: it clamps the page size, waits for a
//! permit and forwards the call. It never caches, merges or reorders.

mod http;

pub use http::{HttpEventSource, HttpEventSourceConfig};

use async_trait::async_trait;
use lpoll_sdk::objects::Event;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors that can occur while fetching events from the backend.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// No permit became available before the caller's deadline
    #[error("no upstream worker available before the deadline")]
    PoolExhausted,

    /// The caller canceled before the fetch completed
    #[error("upstream request canceled")]
    Canceled,

    /// The backend did not answer within the per-call timeout
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP transport error
    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend answered with a body that is not an event page
    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured backend address cannot be used
    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
}

/// The backend's single read operation.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch at most `limit` events of `channel_id` with an id greater than
    /// `offset`, in backend order.
    async fn get_events(
        &self,
        channel_id: &str,
        offset: i64,
        limit: u32,
    ) -> Result<Vec<Event>, UpstreamError>;
}

/// A page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchEvents {
    pub channel_id: String,
    /// Exclusive lower bound: only events after this id are returned.
    pub offset: i64,
    pub limit: u32,
}

/// Configuration of an [`UpstreamPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of backend calls in flight.
    pub workers: usize,
    /// Largest page size ever requested from the backend.
    pub max_limit: u32,
    /// Upper bound for a single backend call.
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 15,
            max_limit: 100,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Concurrency-bounded client for the backend.
pub struct UpstreamPool {
    source: Arc<dyn EventSource>,
    permits: Semaphore,
    config: PoolConfig,
}

impl UpstreamPool {
    pub fn new(source: Arc<dyn EventSource>, config: PoolConfig) -> Self {
        Self {
            source,
            permits: Semaphore::new(config.workers.max(1)),
            config,
        }
    }

    /// Clamp a requested page size into `1..=max_limit`.
    pub fn clamp_limit(&self, limit: u32) -> u32 {
        limit.clamp(1, self.config.max_limit.max(1))
    }

    /// Number of permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Fetch one page of events.
    ///
    /// Waits for a permit until `deadline` (forever if `None`); no backend
    /// call is made if none frees up in time. Canceling `cancel` aborts the
    /// wait or the in-flight call. The permit is released on every path.
    pub async fn fetch(
        &self,
        query: &FetchEvents,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Event>, UpstreamError> {
        let limit = self.clamp_limit(query.limit);

        let _permit = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(UpstreamError::Canceled),

            permit = self.permits.acquire() => {
                permit.map_err(|_| UpstreamError::PoolExhausted)?
            }

            _ = deadline_elapsed(deadline) => return Err(UpstreamError::PoolExhausted),
        };

        debug!(
            channel_id = %query.channel_id,
            offset = query.offset,
            limit,
            "Fetching events from backend"
        );

        let call = self.source.get_events(&query.channel_id, query.offset, limit);
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(UpstreamError::Canceled),

            result = tokio::time::timeout(self.config.request_timeout, call) => {
                result.unwrap_or(Err(UpstreamError::Timeout(self.config.request_timeout)))
            }
        }
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemorySource;
    use super::*;

    fn query(limit: u32) -> FetchEvents {
        FetchEvents {
            channel_id: "orders".into(),
            offset: 0,
            limit,
        }
    }

    fn pool(source: Arc<MemorySource>, workers: usize) -> UpstreamPool {
        UpstreamPool::new(
            source,
            PoolConfig {
                workers,
                max_limit: 100,
                request_timeout: Duration::from_secs(10),
            },
        )
    }

    #[tokio::test]
    async fn test_fetch_returns_events_after_offset() {
        let source = Arc::new(MemorySource::default());
        for id in [5, 6, 7] {
            source.push("orders", id);
        }
        source.push("other", 8);
        let pool = pool(source.clone(), 2);

        let events = pool
            .fetch(
                &FetchEvents {
                    channel_id: "orders".into(),
                    offset: 5,
                    limit: 100,
                },
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![6, 7]);
        assert_eq!(pool.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        let source = Arc::new(MemorySource::default());
        let pool = pool(source.clone(), 1);

        pool.fetch(&query(5000), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(source.last_limit.load(std::sync::atomic::Ordering::SeqCst), 100);
        assert_eq!(pool.clamp_limit(0), 1);
        assert_eq!(pool.clamp_limit(42), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_workers() {
        let source = Arc::new(MemorySource::with_latency(Duration::from_millis(10)));
        let pool = Arc::new(pool(source.clone(), 4));

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    pool.fetch(&query(10), None, &CancellationToken::new()).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(source.calls(), 50);
        assert_eq!(
            source.max_in_flight.load(std::sync::atomic::Ordering::SeqCst),
            4
        );
        assert_eq!(pool.available_permits(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_exhausted_before_deadline() {
        let source = Arc::new(MemorySource::with_latency(Duration::from_secs(5)));
        let pool = Arc::new(pool(source.clone(), 1));

        let busy = {
            let pool = pool.clone();
            tokio::spawn(async move {
                pool.fetch(&query(10), None, &CancellationToken::new()).await
            })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(pool.available_permits(), 0);

        let deadline = Instant::now() + Duration::from_millis(100);
        let result = pool
            .fetch(&query(10), Some(deadline), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(UpstreamError::PoolExhausted)));
        assert_eq!(source.calls(), 1);

        busy.await.unwrap().unwrap();
        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_permit() {
        let source = Arc::new(MemorySource::with_latency(Duration::from_secs(5)));
        let pool = Arc::new(pool(source.clone(), 1));
        let cancel = CancellationToken::new();

        let in_flight = {
            let pool = pool.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.fetch(&query(10), None, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pool.available_permits(), 0);

        cancel.cancel();
        assert!(matches!(
            in_flight.await.unwrap(),
            Err(UpstreamError::Canceled)
        ));
        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_for_permit() {
        let source = Arc::new(MemorySource::with_latency(Duration::from_secs(5)));
        let pool = Arc::new(pool(source.clone(), 1));

        let _busy = {
            let pool = pool.clone();
            tokio::spawn(async move {
                pool.fetch(&query(10), None, &CancellationToken::new()).await
            })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = pool.fetch(&query(10), None, &cancel).await;
        assert!(matches!(result, Err(UpstreamError::Canceled)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let source = Arc::new(MemorySource::with_latency(Duration::from_secs(30)));
        let pool = pool(source, 1);

        let result = pool.fetch(&query(10), None, &CancellationToken::new()).await;
        assert!(matches!(result, Err(UpstreamError::Timeout(_))));
        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_backend_error_is_surfaced() {
        let source = Arc::new(MemorySource::default());
        source.fail_next(UpstreamError::Status {
            status: 502,
            body: "bad gateway".into(),
        });
        let pool = pool(source, 1);

        let result = pool.fetch(&query(10), None, &CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(UpstreamError::Status { status: 502, .. })
        ));
        assert_eq!(pool.available_permits(), 1);
    }
}
