use std::sync::Arc;

use tokio::sync::broadcast;

use livewall_types::events::ChangeEvent;

/// Fans row-level change events and announcements out to every connected
/// subscriber. Delivery is at-most-once per subscriber: whoever is not
/// subscribed at send time never sees the event.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<ChangeEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to the change feed. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish a change to all current subscribers. A send with no
    /// subscribers is fine — the event simply evaporates.
    pub fn broadcast(&self, event: ChangeEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn late_subscribers_miss_earlier_broadcasts() {
        let dispatcher = Dispatcher::new();

        let mut early = dispatcher.subscribe();
        dispatcher.broadcast(ChangeEvent::Announcement {
            event_code: "AB12CD".to_string(),
            message: "cake in five minutes".to_string(),
        });
        let mut late = dispatcher.subscribe();

        let received = early.recv().await.unwrap();
        assert!(matches!(received, ChangeEvent::Announcement { .. }));
        assert!(late.try_recv().is_err());
    }
}
