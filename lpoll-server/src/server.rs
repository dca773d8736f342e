//! Axum server setup and router configuration.

use crate::config::runtime::CorsConfig;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, HeaderValue, Method},
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the main application router.
pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .merge(crate::api::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(cors)),
        )
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Channels with at least one waiting poll.
    channels: usize,
    /// Waiting polls across all channels.
    listeners: usize,
}

/// Simple health check - returns OK if the server is running.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.registry();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        channels: registry.channel_count(),
        listeners: registry.total_listeners(),
    })
}

/// Build the CORS layer from the `[cors]` section.
///
/// `"*"` in origins or headers mirrors the request, since a literal
/// wildcard cannot be combined with credentials.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let any_origin =
        config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*");
    let origin = if any_origin {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers = if config.allowed_headers.iter().any(|h| h == "*") {
        AllowHeaders::mirror_request()
    } else {
        let headers: Vec<HeaderName> = config
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        AllowHeaders::list(headers)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(config.allow_credentials)
        .max_age(Duration::from_secs(config.max_age_secs))
}

/// Run the server until `shutdown` resolves, then drain open connections.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
