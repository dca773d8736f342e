//! Backend event source over HTTP.

use super::{EventSource, UpstreamError};
use async_trait::async_trait;
use lpoll_sdk::objects::{BackendEventsResponse, Event};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Connection-pool settings for [`HttpEventSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpEventSourceConfig {
    /// Idle keep-alive connections kept per backend host.
    pub max_idle_per_host: usize,
    /// How long an idle connection is kept before being closed.
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpEventSourceConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 100,
            idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Reads event pages from the backend's `getEvents` endpoint.
///
/// ```text
/// GET {backend}/api/long-polling/getEvents?channel_id=..&secret=..&offset=..&limit=..
/// ```
///
/// The shared `secret` authenticates the relay to the backend. One
/// `reqwest::Client` (and its keep-alive pool) is shared by all calls.
pub struct HttpEventSource {
    http_client: reqwest::Client,
    endpoint: Url,
    secret: String,
}

impl HttpEventSource {
    const EVENTS_PATH: &str = "/api/long-polling/getEvents";

    pub fn new(
        backend_url: &Url,
        secret: impl Into<String>,
        config: HttpEventSourceConfig,
    ) -> Result<Self, UpstreamError> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.idle_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: backend_url.join(Self::EVENTS_PATH)?,
            secret: secret.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn get_events(
        &self,
        channel_id: &str,
        offset: i64,
        limit: u32,
    ) -> Result<Vec<Event>, UpstreamError> {
        let offset = offset.to_string();
        let limit = limit.to_string();

        let response = self
            .http_client
            .get(self.endpoint.clone())
            .query(&[
                ("channel_id", channel_id),
                ("secret", self.secret.as_str()),
                ("offset", offset.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let page: BackendEventsResponse = serde_json::from_slice(&body)?;

        debug!(
            channel_id,
            count = page.events.len(),
            "Received events from backend"
        );

        Ok(page.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{FetchEvents, PoolConfig, UpstreamPool};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_util::sync::CancellationToken;

    /// Answer one connection with `response` and report its request line.
    async fn serve_once(response: &'static str) -> (Url, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let request = String::from_utf8_lossy(&request);
            let _ = tx.send(request.lines().next().unwrap_or_default().to_owned());
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        });

        (Url::parse(&format!("http://{addr}")).unwrap(), rx)
    }

    fn source(backend: &Url) -> HttpEventSource {
        HttpEventSource::new(backend, "backend-secret", HttpEventSourceConfig::default()).unwrap()
    }

    #[test]
    fn test_endpoint_is_joined_to_backend_url() {
        let backend = Url::parse("http://localhost:8000").unwrap();
        let source =
            HttpEventSource::new(&backend, "secret", HttpEventSourceConfig::default()).unwrap();
        assert_eq!(
            source.endpoint().as_str(),
            "http://localhost:8000/api/long-polling/getEvents"
        );
    }

    #[tokio::test]
    async fn test_query_carries_channel_secret_and_clamped_limit() {
        let (backend, request_line) = serve_once(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: application/json\r\n\
             Content-Length: 63\r\n\
             Connection: close\r\n\r\n\
             {\"events\":[{\"id\":8,\"event\":{\"seq\":8},\"created_at\":1700000008}]}",
        )
        .await;
        let pool = UpstreamPool::new(Arc::new(source(&backend)), PoolConfig::default());

        let query = FetchEvents {
            channel_id: "orders".into(),
            offset: 7,
            limit: 5000,
        };
        let events = pool
            .fetch(&query, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, 8);

        let request_line = request_line.await.unwrap();
        assert!(request_line.starts_with("GET /api/long-polling/getEvents?"));
        for pair in [
            "channel_id=orders",
            "secret=backend-secret",
            "offset=7",
            "limit=100",
        ] {
            assert!(request_line.contains(pair), "{pair} missing from {request_line}");
        }
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let (backend, _) = serve_once(
            "HTTP/1.1 502 Bad Gateway\r\n\
             Content-Length: 4\r\n\
             Connection: close\r\n\r\n\
             nope",
        )
        .await;

        let result = source(&backend).get_events("orders", 0, 10).await;
        assert!(
            matches!(&result, Err(UpstreamError::Status { status: 502, body }) if body == "nope"),
            "unexpected result: {result:?}"
        );
    }

    #[tokio::test]
    async fn test_invalid_body_is_decode_error() {
        let (backend, _) = serve_once(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: application/json\r\n\
             Content-Length: 5\r\n\
             Connection: close\r\n\r\n\
             {bad}",
        )
        .await;

        let result = source(&backend).get_events("orders", 0, 10).await;
        assert!(
            matches!(&result, Err(UpstreamError::Decode(_))),
            "unexpected result: {result:?}"
        );
    }
}
