//! Notification types and delivery queues.
//!
//! Notifications are wake-up hints only: they carry identifiers, and every
//! poll that receives one re-fetches the actual events from the backend.

pub mod channels;

pub use channels::{
    DEFAULT_QUEUE_CAPACITY, NotificationReceiver, NotificationSender, delivery_queue,
};
pub use lpoll_sdk::objects::NotificationEvent;
