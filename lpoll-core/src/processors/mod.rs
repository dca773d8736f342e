//! Processors of the relay.
//!
//! - `FeedListener`: reads the notification feed, hands every notification
//!   to the `FanoutRegistry`
//! - `PollCoordinator`: receives a `LongPoll`, answers it from the upstream
//!   pool, waiting on the registry when there is nothing to return yet

pub mod feed_listener;
pub mod poll_coordinator;

pub use feed_listener::FeedListener;
pub use poll_coordinator::{LongPoll, PollCoordinator, PollError, PollOutcome};
