// ABOUTME: Publish/subscribe fan-out of session notifications
// Subscribers receive data, exit, restore and mode-change events on their own unbounded queue

use crate::session::model::{Channel, SessionId};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Notification published by the session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A process produced output. Published for every chunk, whether or not the session is active.
    Data {
        session: SessionId,
        workspace: PathBuf,
        channel: Channel,
        bytes: Vec<u8>,
    },
    /// A process exited. The session stays registered.
    Exit {
        session: SessionId,
        workspace: PathBuf,
        channel: Channel,
        code: Option<u32>,
    },
    /// A session became active; `chunks` is the replayed history of the focused channel.
    Restore {
        session: SessionId,
        workspace: PathBuf,
        channel: Channel,
        chunks: Vec<Vec<u8>>,
    },
    /// Focus moved to another channel
    ModeChanged {
        session: SessionId,
        workspace: PathBuf,
        channel: Channel,
        label: String,
    },
}

impl SessionEvent {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Data { .. } => EventKind::Data,
            Self::Exit { .. } => EventKind::Exit,
            Self::Restore { .. } => EventKind::Restore,
            Self::ModeChanged { .. } => EventKind::ModeChanged,
        }
    }

    pub const fn session(&self) -> SessionId {
        match self {
            Self::Data { session, .. }
            | Self::Exit { session, .. }
            | Self::Restore { session, .. }
            | Self::ModeChanged { session, .. } => *session,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Data,
    Exit,
    Restore,
    ModeChanged,
}

impl EventKind {
    pub const ALL: [Self; 4] = [Self::Data, Self::Exit, Self::Restore, Self::ModeChanged];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription. Dropping it unsubscribes on the next publish.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Subscription {
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event. Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything queued so far
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

struct Subscriber {
    id: SubscriptionId,
    kinds: Vec<EventKind>,
    sender: mpsc::UnboundedSender<SessionEvent>,
}

/// Fan-out hub owned by the session manager
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                kinds: kinds.to_vec(),
                sender,
            });
        debug!("Subscriber {:?} registered for {:?}", id, kinds);
        Subscription { id, receiver }
    }

    /// Remove a subscriber. Its queue is closed once drained.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        before != subscribers.len()
    }

    pub fn publish(&self, event: &SessionEvent) {
        let kind = event.kind();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|subscriber| {
            if !subscriber.kinds.contains(&kind) {
                return !subscriber.sender.is_closed();
            }
            subscriber.sender.send(event.clone()).is_ok()
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit_event(session: SessionId) -> SessionEvent {
        SessionEvent::Exit {
            session,
            workspace: PathBuf::from("/repo/wt1"),
            channel: Channel::Primary,
            code: Some(0),
        }
    }

    #[test]
    fn test_subscriber_receives_matching_kinds_only() {
        let bus = EventBus::new();
        let mut exits = bus.subscribe(&[EventKind::Exit]);
        let session = SessionId::new();

        bus.publish(&SessionEvent::Data {
            session,
            workspace: PathBuf::from("/repo/wt1"),
            channel: Channel::Primary,
            bytes: b"x".to_vec(),
        });
        bus.publish(&exit_event(session));

        let received = exits.drain();
        assert_eq!(received, vec![exit_event(session)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let mut subscription = bus.subscribe(&EventKind::ALL);
        assert!(bus.unsubscribe(subscription.id()));
        assert!(!bus.unsubscribe(subscription.id()));

        bus.publish(&exit_event(SessionId::new()));
        assert!(subscription.try_recv().is_none());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_subscription_is_pruned_on_publish() {
        let bus = EventBus::new();
        let subscription = bus.subscribe(&EventKind::ALL);
        let _other = bus.subscribe(&[EventKind::Restore]);
        drop(subscription);

        bus.publish(&exit_event(SessionId::new()));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_events_delivered_in_publish_order() {
        let bus = EventBus::new();
        let mut subscription = bus.subscribe(&EventKind::ALL);
        let session = SessionId::new();

        for i in 0..10_u8 {
            bus.publish(&SessionEvent::Data {
                session,
                workspace: PathBuf::from("/repo"),
                channel: Channel::Secondary,
                bytes: vec![i],
            });
        }

        let order: Vec<u8> = subscription
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Data { bytes, .. } => bytes.first().copied(),
                _ => None,
            })
            .collect();
        assert_eq!(order, (0..10).collect::<Vec<u8>>());
    }
}
