use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::logger::{ActionRecord, Street};
use crate::player::{Position, SeatId};
use crate::pot::PotAward;

/// Public seat summary sent when a hand starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatInfo {
    pub seat_id: SeatId,
    pub stack: u32,
    pub position: Option<Position>,
}

/// A seat's revealed hand at showdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShownHand {
    pub seat_id: SeatId,
    pub cards: [Card; 2],
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Showdown,
    Elimination,
    Aborted,
}

/// Final outcome of a hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandResult {
    pub reason: FinishReason,
    pub pot: u64,
    pub awards: Vec<PotAward>,
    /// Chips each seat receives back from the pot
    pub payouts: Vec<(SeatId, u64)>,
    #[serde(default)]
    pub shown: Vec<ShownHand>,
}

impl HandResult {
    pub fn payout(&self, seat: SeatId) -> u64 {
        self.payouts
            .iter()
            .find(|(s, _)| *s == seat)
            .map(|(_, amount)| *amount)
            .unwrap_or(0)
    }

    /// Seats that received chips, in payout order.
    pub fn winners(&self) -> Vec<SeatId> {
        self.payouts
            .iter()
            .filter(|(_, amount)| *amount > 0)
            .map(|(s, _)| *s)
            .collect()
    }
}

/// State changes the transport layer relays to clients.
///
/// `HoleCardsDealt` is private to its seat; everything else is table-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandEvent {
    HandStarted {
        hand_id: String,
        dealer_seat: SeatId,
        seats: Vec<SeatInfo>,
    },
    HoleCardsDealt {
        hand_id: String,
        seat_id: SeatId,
        cards: [Card; 2],
    },
    ActionApplied {
        hand_id: String,
        record: ActionRecord,
        pot: u64,
        next_to_act: Option<SeatId>,
    },
    RoundAdvanced {
        hand_id: String,
        street: Street,
        dealt: Vec<Card>,
        board: Vec<Card>,
    },
    HandFinished {
        hand_id: String,
        result: HandResult,
    },
    HandHalted {
        hand_id: String,
        reason: String,
    },
}

impl HandEvent {
    pub fn hand_id(&self) -> &str {
        match self {
            HandEvent::HandStarted { hand_id, .. }
            | HandEvent::HoleCardsDealt { hand_id, .. }
            | HandEvent::ActionApplied { hand_id, .. }
            | HandEvent::RoundAdvanced { hand_id, .. }
            | HandEvent::HandFinished { hand_id, .. }
            | HandEvent::HandHalted { hand_id, .. } => hand_id,
        }
    }
}

/// Broadcast capability into which the table publishes hand events.
pub trait EventSink: Send {
    fn publish(&mut self, event: HandEvent);
}

/// Shared in-memory event list; clones see the same events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<Vec<HandEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HandEvent> {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<HandEvent> {
        self.inner
            .lock()
            .map(|mut guard| std::mem::take(&mut *guard))
            .unwrap_or_default()
    }
}

impl EventSink for EventLog {
    fn publish(&mut self, event: HandEvent) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.push(event);
        }
    }
}
