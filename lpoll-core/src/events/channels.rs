//! Delivery queue factory and handles.

use super::NotificationEvent;
use tokio::sync::mpsc;

/// Default capacity of a listener's delivery queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Sending half of a delivery queue, held by the fan-out registry.
pub type NotificationSender = mpsc::Sender<NotificationEvent>;
/// Receiving half of a delivery queue, owned by a single poll.
pub type NotificationReceiver = mpsc::Receiver<NotificationEvent>;

/// Create a bounded delivery queue.
///
/// A capacity of zero is rounded up to one.
pub fn delivery_queue(capacity: usize) -> (NotificationSender, NotificationReceiver) {
    mpsc::channel(capacity.max(1))
}
