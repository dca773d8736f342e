//! TOML file configuration structures.
//!
//! These structs directly map to the `lpoll-config.toml` file format.
//! Every section except `[backend]` and `[auth]` may be omitted.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8085").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8085))
}

/// The backend that owns event data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend (e.g., "http://localhost:8000").
    #[serde(default = "default_backend_addr")]
    pub addr: String,
    /// Shared secret sent with every `getEvents` call.
    pub secret: String,
    /// Maximum number of backend calls in flight.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Largest page size ever requested from the backend.
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_backend_addr() -> String {
    "http://localhost:8000".to_string()
}

fn default_workers() -> usize {
    15
}

fn default_max_limit() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_idle_per_host() -> usize {
    100
}

fn default_idle_timeout_secs() -> u64 {
    90
}

/// Notification feed section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Pub/sub topic carrying notifications.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// First reconnect delay, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Reconnect delay ceiling, in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            topic: default_topic(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://redis:6379/0".to_string()
}

fn default_topic() -> String {
    lpoll_core::feed::DEFAULT_TOPIC.to_string()
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

/// Access token section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key used to sign access tokens.
    pub jwt_secret: String,
    /// Token lifetime, in seconds.
    #[serde(default = "default_expires_in_secs")]
    pub expires_in_secs: i64,
    /// "HS256", "HS384" or "HS512".
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Secret a caller must present to obtain a token.
    pub access_secret: String,
}

fn default_expires_in_secs() -> i64 {
    lpoll_sdk::token::DEFAULT_TOKEN_TTL
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

/// Long-poll section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// How long a poll waits for a notification, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Notifications buffered per waiting poll.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Page size used when the caller sends none (or an invalid one).
    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            queue_capacity: default_queue_capacity(),
            default_limit: default_limit(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    25
}

fn default_queue_capacity() -> usize {
    lpoll_core::events::DEFAULT_QUEUE_CAPACITY
}

fn default_limit() -> u32 {
    100
}

/// CORS section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,
    /// Allowed request headers; `"*"` allows any.
    #[serde(default = "default_allowed_headers")]
    pub allowed_headers: Vec<String>,
    #[serde(default = "default_allow_credentials")]
    pub allow_credentials: bool,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            allowed_methods: default_allowed_methods(),
            allowed_headers: default_allowed_headers(),
            allow_credentials: default_allow_credentials(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_allowed_methods() -> Vec<String> {
    ["GET", "POST", "OPTIONS"].map(String::from).to_vec()
}

fn default_allowed_headers() -> Vec<String> {
    ["Content-Type", "Authorization", "X-Requested-With"]
        .map(String::from)
        .to_vec()
}

fn default_allow_credentials() -> bool {
    true
}

fn default_max_age_secs() -> u64 {
    3600
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// "trace", "debug", "info", "warn", "error" or "off". `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "json" or "text".
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_str = r#"
[backend]
secret = "backend-secret"

[auth]
jwt_secret = "jwt-secret"
access_secret = "access-secret"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 8085);
        assert_eq!(config.backend.addr, "http://localhost:8000");
        assert_eq!(config.backend.workers, 15);
        assert_eq!(config.backend.max_limit, 100);
        assert_eq!(config.feed.topic, "longpoll:events");
        assert_eq!(config.feed.backoff_base_ms, 1_000);
        assert_eq!(config.feed.backoff_max_ms, 60_000);
        assert_eq!(config.auth.expires_in_secs, 3600);
        assert_eq!(config.auth.algorithm, "HS256");
        assert_eq!(config.poll.timeout_secs, 25);
        assert_eq!(config.poll.queue_capacity, 10);
        assert_eq!(config.cors.allowed_origins, vec!["*"]);
        assert!(config.cors.allow_credentials);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[backend]
addr = "http://laravel:8080"
secret = "backend-secret"
workers = 4
max_limit = 500
request_timeout_secs = 3

[feed]
redis_url = "redis://127.0.0.1:6379/2"
topic = "custom:events"
backoff_base_ms = 250
backoff_max_ms = 5000

[auth]
jwt_secret = "jwt-secret"
expires_in_secs = 600
algorithm = "HS512"
access_secret = "access-secret"

[poll]
timeout_secs = 10
queue_capacity = 4
default_limit = 20

[cors]
allowed_origins = ["https://app.example.com"]
allow_credentials = false

[log]
level = "debug"
format = "text"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.backend.workers, 4);
        assert_eq!(config.backend.max_limit, 500);
        assert_eq!(config.feed.topic, "custom:events");
        assert_eq!(config.auth.algorithm, "HS512");
        assert_eq!(config.poll.default_limit, 20);
        assert_eq!(config.cors.allowed_origins, vec!["https://app.example.com"]);
        assert_eq!(config.cors.allowed_methods, vec!["GET", "POST", "OPTIONS"]);
        assert!(!config.cors.allow_credentials);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_missing_required_section_fails() {
        let toml_str = r#"
[backend]
secret = "backend-secret"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
