use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use wayfare_shared::GroupEvent;

/// Push-channel sink for per-group change events.
///
/// Delivery is best-effort: `publish` never fails the caller, and a subscriber
/// whose channel is closed or full is dropped from its group.
pub trait Notifier: Send + Sync {
    fn publish(&self, event: GroupEvent);

    /// Register a subscriber on `group_id`; `initial` is delivered to it alone
    fn subscribe(&self, group_id: &str, initial: Option<GroupEvent>) -> Subscription;
}

/// Receiving end of a group subscription
pub struct Subscription {
    group_id: String,
    rx: mpsc::Receiver<GroupEvent>,
}

impl Subscription {
    pub fn new(group_id: &str, rx: mpsc::Receiver<GroupEvent>) -> Self {
        Self {
            group_id: group_id.to_string(),
            rx,
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub async fn recv(&mut self) -> Option<GroupEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<GroupEvent> {
        self.rx.try_recv().ok()
    }

    pub fn into_stream(self) -> ReceiverStream<GroupEvent> {
        ReceiverStream::new(self.rx)
    }
}
