//! Validated runtime configuration.
//!
//! Built from [`FileConfig`](super::file::FileConfig) by the loader once
//! every value has been checked, so the rest of the server never sees an
//! out-of-range setting.

use lpoll_core::upstream::{HttpEventSourceConfig, PoolConfig};
use lpoll_core::utils::backoff::BackoffPolicy;
use lpoll_sdk::token::TokenAlgorithm;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use super::file::CorsConfig;

/// Complete configuration of a running relay.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub feed: FeedConfig,
    pub auth: AuthConfig,
    pub poll: PollSettings,
    pub cors: CorsConfig,
    pub log: LogSettings,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: Url,
    pub secret: String,
    pub pool: PoolConfig,
    pub http: HttpEventSourceConfig,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub redis_url: String,
    pub topic: String,
    pub backoff: BackoffPolicy,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Box<[u8]>,
    pub algorithm: TokenAlgorithm,
    /// Token lifetime, in seconds.
    pub expires_in: i64,
    pub access_secret: Box<[u8]>,
}

// Secrets stay out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("algorithm", &self.algorithm)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Per-request long-poll settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub queue_capacity: usize,
    pub default_limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}
