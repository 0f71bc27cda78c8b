//! Broadcast bus fanning updates out to any number of observers

use tokio::sync::broadcast;

/// Event bus for broadcasting updates to observers
pub struct EventBus<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: T) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(29300u64);
        assert_eq!(first.recv().await.unwrap(), 29300);
        assert_eq!(second.recv().await.unwrap(), 29300);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus: EventBus<u64> = EventBus::default();
        bus.publish(1);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
