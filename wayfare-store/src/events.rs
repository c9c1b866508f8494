use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use wayfare_core::{Notifier, Subscription};
use wayfare_shared::GroupEvent;

/// Per-group fan-out of change events to live subscribers.
///
/// Each subscriber owns a bounded channel. Publishing never waits: a closed
/// channel or one that is full is removed from the group on the spot, and a
/// group left with no subscribers is dropped.
pub struct NotificationHub {
    subscribers: DashMap<String, Vec<mpsc::Sender<GroupEvent>>>,
    capacity: usize,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn subscriber_count(&self, group_id: &str) -> usize {
        self.subscribers.get(group_id).map(|subs| subs.len()).unwrap_or(0)
    }
}

impl Notifier for NotificationHub {
    fn publish(&self, event: GroupEvent) {
        let Some(mut subs) = self.subscribers.get_mut(&event.group_id) else {
            return;
        };

        subs.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Dropping lagging subscriber on group {}", event.group_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Removing closed subscriber on group {}", event.group_id);
                false
            }
        });

        let emptied = subs.is_empty();
        drop(subs);
        if emptied {
            // A subscriber may have joined since the shard lock was released
            self.subscribers.remove_if(&event.group_id, |_, subs| subs.is_empty());
        }
    }

    fn subscribe(&self, group_id: &str, initial: Option<GroupEvent>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        if let Some(event) = initial {
            // Fresh channel with capacity >= 1, cannot be full
            let _ = tx.try_send(event);
        }
        self.subscribers.entry(group_id.to_string()).or_default().push(tx);
        Subscription::new(group_id, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfare_shared::{EventPayload, EventType, Seat};

    fn seat_event(group: &str) -> GroupEvent {
        GroupEvent::update(group, EventPayload::Seats(vec![Seat::seeded(group, 1, 'A')]))
    }

    #[tokio::test]
    async fn test_initial_event_goes_to_new_subscriber_only() {
        let hub = NotificationHub::new(8);
        let mut first = hub.subscribe("FL1", None);
        let mut second = hub.subscribe("FL1", Some(GroupEvent::init("FL1", EventPayload::Seats(vec![]))));

        assert!(first.try_recv().is_none());
        assert_eq!(second.recv().await.unwrap().event_type, EventType::Init);
    }

    #[tokio::test]
    async fn test_publish_reaches_only_its_group() {
        let hub = NotificationHub::new(8);
        let mut fl1 = hub.subscribe("FL1", None);
        let mut fl2 = hub.subscribe("FL2", None);

        hub.publish(seat_event("FL1"));

        assert_eq!(fl1.recv().await.unwrap().group_id, "FL1");
        assert!(fl2.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_broken_subscribers_are_dropped() {
        let hub = NotificationHub::new(1);
        let closed = hub.subscribe("FL1", None);
        let _lagging = hub.subscribe("FL1", None);
        let mut live = hub.subscribe("FL1", None);
        drop(closed);

        hub.publish(seat_event("FL1"));
        assert_eq!(hub.subscriber_count("FL1"), 2);
        assert!(live.recv().await.is_some());

        // `_lagging` never reads, so its single slot is still taken
        hub.publish(seat_event("FL1"));
        assert_eq!(hub.subscriber_count("FL1"), 1);
        assert!(live.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_group_without_subscribers_is_dropped() {
        let hub = NotificationHub::new(8);
        let gone = hub.subscribe("FL1", None);
        let mut kept = hub.subscribe("FL2", None);
        drop(gone);

        hub.publish(seat_event("FL1"));
        hub.publish(seat_event("FL2"));

        assert!(!hub.subscribers.contains_key("FL1"));
        assert_eq!(hub.subscriber_count("FL2"), 1);
        assert!(kept.recv().await.is_some());
    }
}
