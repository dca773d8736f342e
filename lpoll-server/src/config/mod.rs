//! Configuration module for lpoll-server.
//!
//! Handles loading configuration from the TOML file, applying CLI
//! overrides and validating the result into a [`RuntimeConfig`].

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{
    AuthConfig, BackendConfig, FeedConfig, LogFormat, LogSettings, PollSettings, RuntimeConfig,
    ServerConfig,
};
use lpoll_core::upstream::{HttpEventSourceConfig, PoolConfig};
use lpoll_core::utils::backoff::BackoffPolicy;
use lpoll_sdk::token::TokenAlgorithm;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

/// Largest page size the backend may be asked for.
const MAX_LIMIT_CEILING: u32 = 1000;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate and convert it into the runtime configuration
    pub fn load(&self) -> Result<RuntimeConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    fn load_str(&self, config_content: &str) -> Result<RuntimeConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        build_runtime_config(file_config)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

fn build_runtime_config(config: FileConfig) -> Result<RuntimeConfig, ConfigError> {
    let FileConfig {
        server,
        backend,
        feed,
        auth,
        poll,
        cors,
        log,
    } = config;

    // [backend]
    let url = Url::parse(&backend.addr)
        .map_err(|e| invalid(format!("backend.addr {:?}: {e}", backend.addr)))?;
    require_non_empty(&backend.secret, "backend.secret")?;
    if backend.workers == 0 {
        return Err(invalid("backend.workers must be at least 1"));
    }
    if !(1..=MAX_LIMIT_CEILING).contains(&backend.max_limit) {
        return Err(invalid(format!(
            "backend.max_limit must be between 1 and {MAX_LIMIT_CEILING}, got {}",
            backend.max_limit
        )));
    }
    if backend.request_timeout_secs == 0 {
        return Err(invalid("backend.request_timeout_secs must be at least 1"));
    }

    // [feed]
    require_non_empty(&feed.redis_url, "feed.redis_url")?;
    require_non_empty(&feed.topic, "feed.topic")?;
    if feed.backoff_base_ms == 0 || feed.backoff_max_ms < feed.backoff_base_ms {
        return Err(invalid(
            "feed.backoff_base_ms must be positive and not above feed.backoff_max_ms",
        ));
    }

    // [auth]
    require_non_empty(&auth.jwt_secret, "auth.jwt_secret")?;
    require_non_empty(&auth.access_secret, "auth.access_secret")?;
    let algorithm: TokenAlgorithm = auth
        .algorithm
        .parse()
        .map_err(|e| invalid(format!("auth.algorithm: {e}")))?;
    if auth.expires_in_secs <= 0 {
        return Err(invalid("auth.expires_in_secs must be positive"));
    }

    // [poll]
    if poll.timeout_secs == 0 {
        return Err(invalid("poll.timeout_secs must be at least 1"));
    }
    if poll.queue_capacity == 0 {
        return Err(invalid("poll.queue_capacity must be at least 1"));
    }

    // [log]
    let level: LevelFilter = log
        .level
        .parse()
        .map_err(|_| invalid(format!("log.level {:?} is not a log level", log.level)))?;
    let format = match log.format.to_ascii_lowercase().as_str() {
        "json" => LogFormat::Json,
        "text" => LogFormat::Text,
        other => {
            return Err(invalid(format!(
                "log.format must be \"json\" or \"text\", got {other:?}"
            )));
        }
    };

    Ok(RuntimeConfig {
        server: ServerConfig {
            listen: server.listen,
        },
        backend: BackendConfig {
            url,
            secret: backend.secret,
            pool: PoolConfig {
                workers: backend.workers,
                max_limit: backend.max_limit,
                request_timeout: Duration::from_secs(backend.request_timeout_secs),
            },
            http: HttpEventSourceConfig {
                max_idle_per_host: backend.max_idle_per_host,
                idle_timeout: Duration::from_secs(backend.idle_timeout_secs),
                ..HttpEventSourceConfig::default()
            },
        },
        feed: FeedConfig {
            redis_url: feed.redis_url,
            topic: feed.topic,
            backoff: BackoffPolicy {
                base: Duration::from_millis(feed.backoff_base_ms),
                max: Duration::from_millis(feed.backoff_max_ms),
            },
        },
        auth: AuthConfig {
            jwt_secret: auth.jwt_secret.into_bytes().into_boxed_slice(),
            algorithm,
            expires_in: auth.expires_in_secs,
            access_secret: auth.access_secret.into_bytes().into_boxed_slice(),
        },
        poll: PollSettings {
            timeout: Duration::from_secs(poll.timeout_secs),
            queue_capacity: poll.queue_capacity,
            // An out-of-range default is clamped by the upstream pool.
            default_limit: poll.default_limit.max(1),
        },
        cors,
        log: LogSettings { level, format },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[backend]
secret = "backend-secret"

[auth]
jwt_secret = "jwt-secret"
access_secret = "access-secret"
"#;

    fn load(extra: &str) -> Result<RuntimeConfig, ConfigError> {
        ConfigLoader::new("unused.toml", None).load_str(&format!("{BASE}{extra}"))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = load("").unwrap();
        assert_eq!(config.server.listen.port(), 8085);
        assert_eq!(config.backend.url.as_str(), "http://localhost:8000/");
        assert_eq!(config.backend.pool.workers, 15);
        assert_eq!(config.backend.pool.request_timeout, Duration::from_secs(10));
        assert_eq!(config.feed.backoff.base, Duration::from_secs(1));
        assert_eq!(config.feed.backoff.max, Duration::from_secs(60));
        assert_eq!(config.auth.algorithm, TokenAlgorithm::HS256);
        assert_eq!(config.poll.timeout, Duration::from_secs(25));
        assert_eq!(config.log.level, LevelFilter::INFO);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_log_section() {
        let config = load(
            r#"
[log]
level = "debug"
format = "text"
"#,
        )
        .unwrap();
        assert_eq!(config.log.level, LevelFilter::DEBUG);
        assert_eq!(config.log.format, LogFormat::Text);

        for bad in ["level = \"loud\"", "format = \"xml\""] {
            let result = load(&format!("\n[log]\n{bad}\n"));
            assert!(
                matches!(result, Err(ConfigError::ValidationError(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_listen_override() {
        let listen: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let config = ConfigLoader::new("unused.toml", Some(listen))
            .load_str(BASE)
            .unwrap();
        assert_eq!(config.server.listen, listen);
    }

    #[test]
    fn test_max_limit_range() {
        assert!(load("").is_ok());
        for bad in ["0", "1001"] {
            let toml = BASE.replace(
                "secret = \"backend-secret\"",
                &format!("secret = \"backend-secret\"\nmax_limit = {bad}"),
            );
            let result = ConfigLoader::new("unused.toml", None).load_str(&toml);
            assert!(
                matches!(result, Err(ConfigError::ValidationError(_))),
                "max_limit = {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let toml = BASE.replace(
            "jwt_secret = \"jwt-secret\"",
            "jwt_secret = \"jwt-secret\"\nalgorithm = \"RS256\"",
        );
        let result = ConfigLoader::new("unused.toml", None).load_str(&toml);
        assert!(matches!(result, Err(ConfigError::ValidationError(msg)) if msg.contains("RS256")));
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let toml = BASE.replace("access_secret = \"access-secret\"", "access_secret = \"\"");
        let result = ConfigLoader::new("unused.toml", None).load_str(&toml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_invalid_backoff_is_rejected() {
        let result = load(
            r#"
[feed]
backoff_base_ms = 5000
backoff_max_ms = 1000
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new("/nonexistent/lpoll-config.toml", None).load();
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
