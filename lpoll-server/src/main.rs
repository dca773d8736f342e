//! lpoll relay server
//!
//! Bridges a Redis pub/sub notification feed to HTTP long-polling clients,
//! reading event data from the backend through a bounded worker pool.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use anyhow::Context;
use clap::Parser;
use config::ConfigLoader;
use config::runtime::{LogFormat, LogSettings};
use lpoll_core::fanout::FanoutRegistry;
use lpoll_core::feed::RedisFeed;
use lpoll_core::processors::{FeedListener, PollCoordinator};
use lpoll_core::upstream::{HttpEventSource, UpstreamPool};
use lpoll_sdk::token::TokenAuthority;
use server::{build_router, run_server};
use shutdown::shutdown_signal;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// lpoll - long-polling relay for per-channel event feeds
#[derive(Parser, Debug)]
#[command(name = "lpoll-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "LPOLL_CONFIG", default_value = "./lpoll-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:8085)
    #[arg(short, long, env = "LPOLL_LISTEN")]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration; logging is configured by it, so errors here go
    // straight to stderr.
    let config = ConfigLoader::new(&args.config, args.listen)
        .load()
        .with_context(|| format!("failed to load configuration from {:?}", args.config))?;

    // Initialize tracing
    init_tracing(&config.log);

    tracing::info!("Starting lpoll-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Configuration loaded from {:?}", args.config);

    let tokens = TokenAuthority::new(
        &config.auth.jwt_secret,
        config.auth.algorithm,
        config.auth.expires_in,
    );

    // Backend access
    let source = HttpEventSource::new(
        &config.backend.url,
        config.backend.secret.clone(),
        config.backend.http,
    )
    .map_err(|e| {
        tracing::error!("Failed to create backend client: {}", e);
        e
    })?;
    tracing::info!(
        endpoint = %source.endpoint(),
        workers = config.backend.pool.workers,
        "Backend event source ready"
    );
    let pool = Arc::new(UpstreamPool::new(Arc::new(source), config.backend.pool));

    // Notification fan-out
    let registry = FanoutRegistry::new(config.poll.queue_capacity);
    let feed = RedisFeed::new(&config.feed.redis_url, config.feed.topic.clone()).map_err(|e| {
        tracing::error!("Invalid Redis configuration: {}", e);
        e
    })?;

    let (feed_shutdown_tx, feed_shutdown_rx) = watch::channel(false);
    let feed_task = tokio::spawn(
        FeedListener::new(feed, registry.clone(), config.feed.backoff).run(feed_shutdown_rx),
    );

    // Create application state
    let polls_shutdown = CancellationToken::new();
    let state = AppState::new(
        tokens,
        PollCoordinator::new(pool, registry),
        config.poll,
        &config.auth.access_secret,
        polls_shutdown.clone(),
    );

    // Build the router
    let router = build_router(state, &config.cors);

    // Run the server; waiting polls are released as soon as shutdown starts
    // so open connections can drain.
    let listen_addr = config.server.listen;
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, async move {
        shutdown_signal().await;
        polls_shutdown.cancel();
    })
    .await;

    // Stop the feed listener
    let _ = feed_shutdown_tx.send(true);
    if let Err(e) = feed_task.await {
        tracing::error!("Feed listener task failed: {}", e);
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::builder()
        .with_default_directive(log.level.into())
        .from_env_lossy();

    let json = log.format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}
