//! Application state shared across all request handlers.

use crate::config::runtime::PollSettings;
use lpoll_core::fanout::FanoutRegistry;
use lpoll_core::processors::PollCoordinator;
use lpoll_sdk::token::TokenAuthority;
use ring::digest;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Issues and validates channel access tokens.
    pub tokens: Arc<TokenAuthority>,
    /// Runs long-polls.
    pub coordinator: PollCoordinator,
    pub poll: PollSettings,
    /// Canceled on shutdown; every poll waits on a child of it.
    pub shutdown: CancellationToken,
    access_secret_digest: Arc<[u8]>,
}

impl AppState {
    pub fn new(
        tokens: TokenAuthority,
        coordinator: PollCoordinator,
        poll: PollSettings,
        access_secret: &[u8],
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            tokens: Arc::new(tokens),
            coordinator,
            poll,
            shutdown,
            access_secret_digest: Arc::from(secret_digest(access_secret)),
        }
    }

    pub fn registry(&self) -> &FanoutRegistry {
        self.coordinator.registry()
    }

    /// Check a caller-supplied secret against the configured access secret.
    pub fn verify_access_secret(&self, secret: &str) -> bool {
        secret_digest(secret.as_bytes()) == *self.access_secret_digest
    }
}

fn secret_digest(secret: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA256, secret).as_ref().to_vec()
}
