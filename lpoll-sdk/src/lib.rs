//! Shared types for the lpoll long-polling relay.
//!
//! - [`objects`] holds the JSON shapes exchanged with the backend, the
//!   notification publisher and long-polling clients.
//! - [`token`] issues and validates channel-scoped access tokens.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![forbid(unsafe_code)]

pub mod objects;
pub mod token;
