//! Fan-out registry.
//!
//! The registry maps a channel id to the set of polls currently waiting on
//! it. Each waiting poll owns a [`Subscription`] holding the receiving half
//! of a bounded delivery queue; the registry holds the sending half.
//!
//! # Locking
//!
//! The map sits behind a single readers-writer lock:
//!
//! - a delivery sweep takes the read lock, so concurrent sweeps run
//!   together;
//! - subscribe and unsubscribe take the write lock.
//!
//! Unsubscribing removes (and drops) the sender under the write lock, so
//! once it returns no sweep can still be holding that sender. Sweeps only
//! use `try_send` and never await while holding the lock.
//!
//! The lock is synchronous because unsubscribing happens in
//! [`Subscription`]'s `Drop`, which also covers polls whose future is
//! dropped mid-wait.

use crate::events::{NotificationEvent, NotificationReceiver, NotificationSender, delivery_queue};
use kanau::processor::Processor;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, warn};

/// Identifier of a single registration, unique within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

struct Listener {
    id: RegistrationId,
    sender: NotificationSender,
}

struct RegistryInner {
    channels: RwLock<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl RegistryInner {
    // A panic while holding the lock cannot leave the map half-updated,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Listener>>> {
        self.channels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Listener>>> {
        self.channels.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-channel registry of waiting polls.
///
/// Cloning is cheap; all clones share the same map.
#[derive(Clone)]
pub struct FanoutRegistry {
    inner: Arc<RegistryInner>,
}

impl FanoutRegistry {
    /// Create a registry whose delivery queues hold `queue_capacity`
    /// notifications each.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                channels: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                queue_capacity: queue_capacity.max(1),
            }),
        }
    }

    /// Register a new listener on `channel_id`.
    ///
    /// The returned [`Subscription`] receives every notification for the
    /// channel until it is unsubscribed or dropped.
    pub fn subscribe(&self, channel_id: &str) -> Subscription {
        let id = RegistrationId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = delivery_queue(self.inner.queue_capacity);

        self.inner
            .write()
            .entry(channel_id.to_owned())
            .or_default()
            .push(Listener { id, sender });

        debug!(channel_id, registration = id.0, "Subscribed to channel");

        Subscription {
            id,
            channel_id: channel_id.to_owned(),
            receiver,
            registry: self.clone(),
            registered: true,
        }
    }

    /// Remove a registration and close its queue.
    ///
    /// The channel entry is dropped once its last listener is gone. Returns
    /// `false` if the registration was not (or no longer) present.
    pub fn unsubscribe(&self, channel_id: &str, id: RegistrationId) -> bool {
        let mut channels = self.inner.write();
        let Some(listeners) = channels.get_mut(channel_id) else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        let removed = listeners.len() != before;

        if listeners.is_empty() {
            channels.remove(channel_id);
        }
        drop(channels);

        if removed {
            debug!(channel_id, registration = id.0, "Unsubscribed from channel");
        }
        removed
    }

    /// Offer `event` to every listener of its channel without blocking.
    ///
    /// A listener whose queue is full misses this notification; the others
    /// are unaffected. Returns the number of listeners that accepted it.
    pub fn deliver(&self, event: &NotificationEvent) -> usize {
        let channels = self.inner.read();
        let Some(listeners) = channels.get(&event.channel_id) else {
            return 0;
        };

        let mut delivered = 0;
        for listener in listeners {
            match listener.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        channel_id = %event.channel_id,
                        event_id = event.event_id,
                        registration = listener.id.0,
                        "Delivery queue is full, dropping notification"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(
                        channel_id = %event.channel_id,
                        registration = listener.id.0,
                        "Delivery queue already closed"
                    );
                }
            }
        }
        delivered
    }

    /// Number of channels with at least one listener.
    pub fn channel_count(&self) -> usize {
        self.inner.read().len()
    }

    /// Number of live listeners on `channel_id`.
    pub fn listener_count(&self, channel_id: &str) -> usize {
        self.inner.read().get(channel_id).map_or(0, Vec::len)
    }

    /// Number of live listeners across all channels.
    pub fn total_listeners(&self) -> usize {
        self.inner.read().values().map(Vec::len).sum()
    }

    /// Number of registrations ever created by this registry.
    pub fn registrations_created(&self) -> u64 {
        self.inner.next_id.load(Ordering::Relaxed)
    }
}

impl Default for FanoutRegistry {
    fn default() -> Self {
        Self::new(crate::events::DEFAULT_QUEUE_CAPACITY)
    }
}

impl Processor<NotificationEvent> for FanoutRegistry {
    type Output = usize;
    type Error = Infallible;

    async fn process(&self, event: NotificationEvent) -> Result<usize, Infallible> {
        Ok(self.deliver(&event))
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live registration, exclusively owned by one poll.
///
/// Dropping it unsubscribes.
pub struct Subscription {
    id: RegistrationId,
    channel_id: String,
    receiver: NotificationReceiver,
    registry: FanoutRegistry,
    registered: bool,
}

impl Subscription {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Wait for the next notification.
    ///
    /// Returns `None` once unsubscribed and the queue is drained.
    pub async fn recv(&mut self) -> Option<NotificationEvent> {
        self.receiver.recv().await
    }

    /// Take a queued notification without waiting.
    pub fn try_recv(&mut self) -> Result<NotificationEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Deregister now, keeping already-queued notifications readable.
    pub fn unsubscribe(&mut self) {
        if self.registered {
            self.registry.unsubscribe(&self.channel_id, self.id);
            self.registered = false;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
