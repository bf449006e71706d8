// Notification Bus - Pub/Sub for Dashboard Snapshots
//
// Provides in-memory snapshot broadcasting using tokio broadcast channels.
// Enables real-time streaming of instance/bucket/app collections to SSE
// endpoints and other observers.
//
// Delivery is best-effort: every payload is a full replacement snapshot, so
// a subscriber that lags or misses an event recovers on the next publish.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::app::App;
use crate::domain::bucket::Bucket;
use crate::domain::events::{Notification, Topic};
use crate::domain::instance::Instance;

/// Bus for publishing and subscribing to snapshot notifications
#[derive(Clone)]
pub struct NotificationBus {
    sender: Arc<broadcast::Sender<Notification>>,
}

impl NotificationBus {
    /// Create a new bus with specified channel capacity.
    /// Capacity determines how many notifications can be buffered before
    /// dropping old ones.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create a bus with default capacity (256)
    pub fn with_default_capacity() -> Self {
        Self::new(256)
    }

    /// Publish a full instances snapshot
    pub fn publish_instances(&self, instances: Vec<Instance>) {
        self.publish(Notification::Instances(instances));
    }

    /// Publish a full buckets snapshot
    pub fn publish_buckets(&self, buckets: Vec<Bucket>) {
        self.publish(Notification::Buckets(buckets));
    }

    /// Publish a full apps snapshot
    pub fn publish_apps(&self, apps: Vec<App>) {
        self.publish(Notification::Apps(apps));
    }

    /// Publish a notification to all subscribers
    pub fn publish(&self, notification: Notification) {
        debug!(topic = %notification.topic(), "Publishing snapshot");

        // send() returns the number of receivers that received the message
        let receiver_count = self.sender.send(notification).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening on the bus");
        }
    }

    /// Subscribe to all notifications
    pub fn subscribe(&self) -> NotificationReceiver {
        NotificationReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe and filter for a single topic
    pub fn subscribe_topic(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            receiver: self.sender.subscribe(),
            topic,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for all notifications
pub struct NotificationReceiver {
    receiver: broadcast::Receiver<Notification>,
}

impl NotificationReceiver {
    /// Receive the next notification (blocks until one is available)
    pub async fn recv(&mut self) -> Result<Notification, NotificationBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => NotificationBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Notification receiver lagged by {} events", n);
                NotificationBusError::Lagged(n)
            }
        })
    }

    /// Try to receive a notification without blocking
    pub fn try_recv(&mut self) -> Result<Notification, NotificationBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => NotificationBusError::Empty,
            broadcast::error::TryRecvError::Closed => NotificationBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Notification receiver lagged by {} events", n);
                NotificationBusError::Lagged(n)
            }
        })
    }

    /// Unwrap into the underlying broadcast receiver (for stream adapters)
    pub fn into_inner(self) -> broadcast::Receiver<Notification> {
        self.receiver
    }
}

/// Receiver filtered to a single topic
pub struct TopicReceiver {
    receiver: broadcast::Receiver<Notification>,
    topic: Topic,
}

impl TopicReceiver {
    /// Receive the next notification on this receiver's topic
    pub async fn recv(&mut self) -> Result<Notification, NotificationBusError> {
        loop {
            let notification = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => NotificationBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Notification receiver lagged by {} events", n);
                    NotificationBusError::Lagged(n)
                }
            })?;

            if notification.topic() == self.topic {
                return Ok(notification);
            }
        }
    }
}

/// Errors that can occur when receiving notifications
#[derive(Debug, thiserror::Error)]
pub enum NotificationBusError {
    #[error("Notification bus is closed")]
    Closed,

    #[error("No notifications available")]
    Empty,

    #[error("Receiver lagged by {0} notifications (snapshots were dropped)")]
    Lagged(u64),
}
