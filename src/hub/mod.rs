//! Alert Hub - live multicast feed of newly stored notifications
//!
//! One long-lived hub instance fans newly stored notifications out to any
//! number of WebSocket subscribers. Delivery is best-effort: the channel
//! buffers per subscriber and a subscriber that lags past the capacity
//! loses the oldest messages (tokio broadcast lag semantics) rather than
//! stalling the publisher. The Notification Store is the durable record;
//! the hub is only a live tap.

use tokio::sync::broadcast;
use tracing::debug;

use crate::db::schemas::NotificationDoc;

/// Default per-subscriber buffer capacity
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;

/// Hub for broadcasting stored notifications to live subscribers
pub struct AlertHub {
    sender: broadcast::Sender<NotificationDoc>,
}

impl AlertHub {
    /// Create a new hub with the given per-subscriber buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to notifications published after this call.
    ///
    /// Dropping the receiver cancels the subscription without affecting
    /// other subscribers or the publisher.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationDoc> {
        self.sender.subscribe()
    }

    /// Publish a notification to all current subscribers.
    ///
    /// Never blocks; returns the number of subscribers the message was
    /// queued for (zero when nobody is listening).
    pub fn publish(&self, notification: NotificationDoc) -> usize {
        match self.sender.send(notification) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Notification published with no live subscribers");
                0
            }
        }
    }

    /// Number of currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AlertHub {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_CAPACITY)
    }
}
