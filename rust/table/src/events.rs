use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use holdem_engine::events::{EventSink, HandEvent};
use holdem_engine::player::SeatId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub type TableId = String;

// Bounded per subscriber; a subscriber that falls this far behind is dropped
const DEFAULT_EVENT_BUFFER: usize = 1000;

pub type EventSender = mpsc::Sender<TableEvent>;
pub type EventReceiver = mpsc::Receiver<TableEvent>;

/// A hand event tagged with the table it happened at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEvent {
    pub table_id: TableId,
    #[serde(flatten)]
    pub event: HandEvent,
}

/// Who is listening. Hole cards only reach the seat they were dealt to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Seat(SeatId),
    Observer,
}

impl Viewer {
    /// The seat this viewer sits in, if any.
    pub fn seat(&self) -> Option<SeatId> {
        match self {
            Viewer::Seat(seat_id) => Some(*seat_id),
            Viewer::Observer => None,
        }
    }

    pub fn can_see(&self, event: &HandEvent) -> bool {
        match event {
            HandEvent::HoleCardsDealt { seat_id, .. } => *self == Viewer::Seat(*seat_id),
            _ => true,
        }
    }
}

pub struct EventSubscription {
    bus: EventBus,
    table_id: TableId,
    subscriber_id: usize,
    pub receiver: EventReceiver,
}

impl EventSubscription {
    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }

    pub async fn recv(&mut self) -> Option<TableEvent> {
        self.receiver.recv().await
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.table_id, self.subscriber_id);
    }
}

#[derive(Debug)]
struct Subscriber {
    id: usize,
    viewer: Viewer,
    sender: EventSender,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug)]
struct EventBusInner {
    subscribers: RwLock<HashMap<TableId, Vec<Subscriber>>>,
    next_id: AtomicUsize,
    buffer: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_buffer(DEFAULT_EVENT_BUFFER)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicUsize::new(0),
                buffer: buffer.max(1),
            }),
        }
    }

    pub fn subscribe(&self, table_id: &str, viewer: Viewer) -> EventSubscription {
        let (subscriber_id, receiver) = self.subscribe_raw(table_id, viewer);
        EventSubscription {
            bus: self.clone(),
            table_id: table_id.to_string(),
            subscriber_id,
            receiver,
        }
    }

    fn subscribe_raw(&self, table_id: &str, viewer: Viewer) -> (usize, EventReceiver) {
        let (sender, rx) = mpsc::channel(self.inner.buffer);
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        let mut guard = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.entry(table_id.to_string()).or_default().push(Subscriber {
            id,
            viewer,
            sender,
        });

        tracing::info!(
            table_id = %table_id,
            subscriber_id = id,
            viewer = ?viewer,
            "client subscribed to table events"
        );

        (id, rx)
    }

    pub fn broadcast(&self, table_id: &str, event: HandEvent) {
        let mut failed = Vec::new();
        {
            let guard = self
                .inner
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(list) = guard.get(table_id) else {
                tracing::trace!(table_id = %table_id, "no subscribers for table");
                return;
            };
            let wrapped = TableEvent {
                table_id: table_id.to_string(),
                event,
            };
            for sub in list.iter().filter(|s| s.viewer.can_see(&wrapped.event)) {
                // Never block the table task on a slow client
                if let Err(e) = sub.sender.try_send(wrapped.clone()) {
                    tracing::warn!(
                        table_id = %table_id,
                        subscriber_id = sub.id,
                        error = %e,
                        "dropping table event subscriber"
                    );
                    failed.push(sub.id);
                }
            }
        }
        if !failed.is_empty() {
            self.remove_subscribers(table_id, &failed);
        }
    }

    pub fn unsubscribe(&self, table_id: &str, subscriber_id: usize) {
        self.remove_subscribers(table_id, &[subscriber_id]);
    }

    pub fn drop_table(&self, table_id: &str) {
        let mut guard = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.remove(table_id);
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.values().map(|list| list.len()).sum()
    }

    /// Event sink that publishes into this bus under `table_id`.
    pub fn sink(&self, table_id: &str) -> BusSink {
        BusSink {
            bus: self.clone(),
            table_id: table_id.to_string(),
        }
    }

    fn remove_subscribers(&self, table_id: &str, ids: &[usize]) {
        let mut guard = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = guard.get_mut(table_id) {
            list.retain(|s| !ids.contains(&s.id));
            if list.is_empty() {
                guard.remove(table_id);
            }
        }
    }
}

/// Adapts the bus to the engine's broadcast port.
#[derive(Debug, Clone)]
pub struct BusSink {
    bus: EventBus,
    table_id: TableId,
}

impl EventSink for BusSink {
    fn publish(&mut self, event: HandEvent) {
        tracing::debug!(table_id = %self.table_id, hand_id = event.hand_id(), "publishing hand event");
        self.bus.broadcast(&self.table_id, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_engine::cards::Card;

    fn hole(seat_id: SeatId) -> HandEvent {
        HandEvent::HoleCardsDealt {
            hand_id: "h".into(),
            seat_id,
            cards: ["As".parse::<Card>().unwrap(), "Kd".parse::<Card>().unwrap()],
        }
    }

    fn halted() -> HandEvent {
        HandEvent::HandHalted {
            hand_id: "h".into(),
            reason: "test".into(),
        }
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let bus = EventBus::new();
        {
            let _sub = bus.subscribe("t", Viewer::Observer);
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn broadcast_reaches_all_subscribers_of_the_table() {
        let bus = EventBus::new();
        let mut sub1 = bus.subscribe("t", Viewer::Observer);
        let mut sub2 = bus.subscribe("t", Viewer::Seat(1));
        let mut other = bus.subscribe("u", Viewer::Observer);

        bus.broadcast("t", halted());

        let ev1 = sub1.receiver.try_recv().expect("sub1 event");
        let ev2 = sub2.receiver.try_recv().expect("sub2 event");
        assert_eq!(ev1.table_id, "t");
        assert!(matches!(ev2.event, HandEvent::HandHalted { .. }));
        assert!(other.receiver.try_recv().is_err());
    }

    #[test]
    fn hole_cards_only_reach_their_seat() {
        let bus = EventBus::new();
        let mut seat1 = bus.subscribe("t", Viewer::Seat(1));
        let mut seat2 = bus.subscribe("t", Viewer::Seat(2));
        let mut watcher = bus.subscribe("t", Viewer::Observer);

        bus.broadcast("t", hole(1));

        assert!(seat1.receiver.try_recv().is_ok());
        assert!(seat2.receiver.try_recv().is_err());
        assert!(watcher.receiver.try_recv().is_err());
    }

    #[test]
    fn stale_receiver_is_pruned() {
        let bus = EventBus::new();
        let (id, rx) = bus.subscribe_raw("t", Viewer::Observer);
        drop(rx);
        bus.broadcast("t", halted());
        assert_eq!(bus.subscriber_count(), 0);
        bus.unsubscribe("t", id);
    }

    #[test]
    fn full_subscriber_is_dropped() {
        let bus = EventBus::with_buffer(1);
        let _sub = bus.subscribe("t", Viewer::Observer);
        bus.broadcast("t", halted());
        assert_eq!(bus.subscriber_count(), 1);
        bus.broadcast("t", halted());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn table_events_serialize_flat() {
        let json = serde_json::to_value(TableEvent {
            table_id: "t".into(),
            event: halted(),
        })
        .unwrap();
        assert_eq!(json["table_id"], "t");
        assert_eq!(json["type"], "hand_halted");
        assert_eq!(json["reason"], "test");
    }
}
