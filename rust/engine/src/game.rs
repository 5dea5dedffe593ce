//! Table-level bookkeeping around individual hands.
//!
//! A [`Table`] owns the seats between hands, rotates the button, numbers
//! hands, and connects a running [`Hand`] to its collaborators: the event
//! sink, the checkpoint store and the chip ledger. A finished hand's final
//! checkpoint is always stored before the ledger is touched, and the ledger
//! settles a hand completely or not at all.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::config::TableConfig;
use crate::deck::Deck;
use crate::engine::{Hand, HandState, HandStatus};
use crate::errors::{ActionError, EngineError};
use crate::events::{EventSink, HandEvent};
use crate::ledger::{ChipLedger, Settlement, SettlementEntry};
use crate::logger::{format_hand_id, CheckpointKind, CheckpointSink, HandCheckpoint, Street};
use crate::player::{PlayerAction, Seat, SeatId, SeatStatus, TableSeat};

/// Issues `YYYYMMDD-NNNNNN` hand ids; the counter restarts each day.
#[derive(Debug, Clone, Default)]
pub struct HandIdSequence {
    date: String,
    seq: u32,
}

impl HandIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, yyyymmdd: &str) -> String {
        if self.date != yyyymmdd {
            self.date = yyyymmdd.to_string();
            self.seq = 0;
        }
        self.seq += 1;
        format_hand_id(&self.date, self.seq)
    }

    /// Moves the counter past an id issued elsewhere, such as a recovered hand.
    pub fn observe(&mut self, hand_id: &str) {
        let Some((date, seq)) = hand_id.split_once('-') else {
            return;
        };
        let Ok(seq) = seq.parse::<u32>() else {
            return;
        };
        if date > self.date.as_str() {
            self.date = date.to_string();
            self.seq = seq;
        } else if date == self.date && seq > self.seq {
            self.seq = seq;
        }
    }
}

/// A finished hand whose chips have not reached the ledger yet.
#[derive(Debug, Clone)]
struct PendingSettlement {
    settlement: Settlement,
    kind: CheckpointKind,
    persisted: bool,
}

pub struct Table {
    config: TableConfig,
    seats: BTreeMap<SeatId, TableSeat>,
    button: Option<SeatId>,
    ids: HandIdSequence,
    /// Derives per-hand deck seeds when the table runs with a fixed seed
    seed_rng: Option<ChaCha20Rng>,
    hand: Option<Hand>,
    pending: Option<PendingSettlement>,
    /// Streets whose checkpoint could not be stored yet
    unsaved_streets: Vec<Street>,
    events: Box<dyn EventSink>,
    checkpoints: Box<dyn CheckpointSink>,
    ledger: Box<dyn ChipLedger>,
}

impl Table {
    pub fn new(
        config: TableConfig,
        events: Box<dyn EventSink>,
        checkpoints: Box<dyn CheckpointSink>,
        ledger: Box<dyn ChipLedger>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let seed_rng = config.seed.map(ChaCha20Rng::seed_from_u64);
        Ok(Self {
            config,
            seats: BTreeMap::new(),
            button: None,
            ids: HandIdSequence::new(),
            seed_rng,
            hand: None,
            pending: None,
            unsaved_streets: Vec::new(),
            events,
            checkpoints,
            ledger,
        })
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Seats a player (or replaces the seat's stack) between hands.
    pub fn seat_player(&mut self, seat: TableSeat) -> Result<(), EngineError> {
        if seat.seat_id >= self.config.max_seats {
            return Err(EngineError::InvalidConfig(format!(
                "seat {} outside a {}-seat table",
                seat.seat_id, self.config.max_seats
            )));
        }
        self.ensure_idle()?;
        self.seats.insert(seat.seat_id, seat);
        Ok(())
    }

    pub fn remove_player(&mut self, seat_id: SeatId) -> Result<Option<TableSeat>, EngineError> {
        self.ensure_idle()?;
        Ok(self.seats.remove(&seat_id))
    }

    pub fn set_sitting_out(&mut self, seat_id: SeatId, sitting_out: bool) -> Result<(), EngineError> {
        let seat = self
            .seats
            .get_mut(&seat_id)
            .ok_or(ActionError::UnknownSeat(seat_id))?;
        seat.sitting_out = sitting_out;
        Ok(())
    }

    pub fn seats(&self) -> Vec<TableSeat> {
        self.seats.values().copied().collect()
    }

    pub fn button(&self) -> Option<SeatId> {
        self.button
    }

    pub fn current_hand(&self) -> Option<&Hand> {
        self.hand.as_ref()
    }

    /// Id of a finished hand still waiting for the ledger.
    pub fn pending_settlement(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.settlement.hand_id.as_str())
    }

    /// Moves the button, shuffles and deals a new hand.
    pub fn start_hand(&mut self) -> Result<String, EngineError> {
        self.ensure_idle()?;
        let deck = match self.seed_rng.as_mut() {
            Some(rng) => Deck::new_with_seed(rng.random::<u64>()),
            None => Deck::shuffled(),
        };
        self.start_hand_with_deck(deck)
    }

    /// Like [`Table::start_hand`] with a deck the caller prepared, e.g. a
    /// scripted [`Deck::stacked`] for replaying a known hand.
    pub fn start_hand_with_deck(&mut self, deck: Deck) -> Result<String, EngineError> {
        self.ensure_idle()?;
        let seats = self.seats();
        let dealer = self.next_button(&seats)?;
        let today = Utc::now().format("%Y%m%d").to_string();
        let id = self.ids.next_id(&today);

        let mut hand = Hand::start(id.clone(), self.config.clone(), &seats, dealer, deck)?;
        persist(self.checkpoints.as_mut(), CheckpointKind::HandStarted, &hand)?;
        self.button = Some(dealer);
        let events = hand.take_events();
        self.hand = Some(hand);
        self.publish_all(events);
        self.after_progress()?;
        Ok(id)
    }

    pub fn apply_action(
        &mut self,
        hand_id: &str,
        seat_id: SeatId,
        action: PlayerAction,
    ) -> Result<(), EngineError> {
        let res = self.hand_mut(hand_id)?.apply_action(seat_id, action);
        self.flush_events();
        res?;
        self.after_progress()
    }

    pub fn force_timeout(&mut self, hand_id: &str, seat_id: SeatId) -> Result<(), EngineError> {
        let res = self.hand_mut(hand_id)?.force_timeout(seat_id);
        self.flush_events();
        res?;
        self.after_progress()
    }

    pub fn hand_state(&self, hand_id: &str) -> Option<HandState> {
        self.hand
            .as_ref()
            .filter(|h| h.id() == hand_id)
            .map(Hand::snapshot)
    }

    /// State of the hand as `viewer` may see it; see [`Hand::snapshot_for`].
    pub fn hand_state_for(&self, hand_id: &str, viewer: Option<SeatId>) -> Option<HandState> {
        self.hand
            .as_ref()
            .filter(|h| h.id() == hand_id)
            .map(|h| h.snapshot_for(viewer))
    }

    pub fn abort_hand(&mut self, hand_id: &str, reason: &str) -> Result<(), EngineError> {
        self.hand_mut(hand_id)?.abort(reason)?;
        self.flush_events();
        self.complete(CheckpointKind::Aborted)
    }

    /// Replaces the current hand with its latest stored checkpoint.
    ///
    /// A checkpoint of a finished hand comes back as pending settlement;
    /// [`Table::retry_settlement`] then applies it to the ledger.
    pub fn recover_from_checkpoint(&mut self, hand_id: &str) -> Result<HandState, EngineError> {
        let checkpoint = self
            .checkpoints
            .latest(hand_id)
            .map_err(|e| EngineError::Persistence(e.to_string()))?
            .ok_or_else(|| EngineError::Persistence(format!("no checkpoint for hand {hand_id}")))?;
        let hand = checkpoint.hand;
        tracing::info!(
            hand_id,
            kind = ?checkpoint.kind,
            status = ?hand.status(),
            "recovered hand from checkpoint"
        );
        self.button = Some(hand.dealer_seat());
        self.ids.observe(hand.id());
        for seat in hand.seats() {
            self.seats.entry(seat.seat_id).or_insert(TableSeat {
                seat_id: seat.seat_id,
                stack: pre_hand_stack(&hand, seat),
                sitting_out: seat.status == SeatStatus::SittingOut,
            });
        }
        self.unsaved_streets.clear();
        self.pending = match hand.status() {
            HandStatus::Finished => Some(PendingSettlement {
                settlement: settlement_for(&hand),
                kind: checkpoint.kind,
                persisted: true,
            }),
            _ => None,
        };
        let state = hand.snapshot();
        self.hand = Some(hand);
        Ok(state)
    }

    /// Re-attempts the checkpoint and ledger steps of a finished hand.
    pub fn retry_settlement(&mut self, hand_id: &str) -> Result<(), EngineError> {
        if self.pending_settlement() != Some(hand_id) {
            return Err(ActionError::HandNotInProgress.into());
        }
        self.settle_pending()
    }

    fn ensure_idle(&self) -> Result<(), EngineError> {
        if let Some(pending) = &self.pending {
            return Err(EngineError::SettlementPending {
                hand_id: pending.settlement.hand_id.clone(),
            });
        }
        match &self.hand {
            Some(hand) if hand.status() != HandStatus::Finished => {
                Err(EngineError::HandAlreadyInProgress {
                    hand_id: hand.id().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn hand_mut(&mut self, hand_id: &str) -> Result<&mut Hand, EngineError> {
        match self.hand.as_mut() {
            Some(hand) if hand.id() == hand_id => Ok(hand),
            _ => Err(ActionError::HandNotInProgress.into()),
        }
    }

    /// Clockwise after the previous button; first hand picks at random, or
    /// the lowest seat when the table is seeded.
    fn next_button(&self, seats: &[TableSeat]) -> Result<SeatId, EngineError> {
        let playing: Vec<SeatId> = seats
            .iter()
            .filter(|s| s.can_play())
            .map(|s| s.seat_id)
            .collect();
        if playing.len() < 2 {
            return Err(EngineError::NotEnoughSeats {
                found: playing.len(),
            });
        }
        let seat = match self.button {
            Some(prev) => playing
                .iter()
                .copied()
                .find(|&s| s > prev)
                .unwrap_or(playing[0]),
            None if self.config.seed.is_some() => playing[0],
            None => playing[rand::rng().random_range(0..playing.len())],
        };
        Ok(seat)
    }

    /// Checkpoints newly dealt streets and completes a hand that finished.
    ///
    /// A street checkpoint that fails is retried on the next call. A hand
    /// that finished is completed regardless, and its final checkpoint
    /// covers the streets left unsaved.
    fn after_progress(&mut self) -> Result<(), EngineError> {
        let Some(hand) = self.hand.as_mut() else {
            return Ok(());
        };
        let mut streets = std::mem::take(&mut self.unsaved_streets);
        streets.extend(hand.take_streets_dealt());
        let mut failure = None;
        for (i, &street) in streets.iter().enumerate() {
            let kind = CheckpointKind::StreetDealt(street);
            if let Err(err) = persist(self.checkpoints.as_mut(), kind, hand) {
                self.unsaved_streets = streets[i..].to_vec();
                failure = Some(err);
                break;
            }
        }
        if hand.status() == HandStatus::Finished {
            self.unsaved_streets.clear();
            return self.complete(CheckpointKind::Finished);
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn complete(&mut self, kind: CheckpointKind) -> Result<(), EngineError> {
        let hand = self.hand.as_ref().ok_or(ActionError::HandNotInProgress)?;
        self.pending = Some(PendingSettlement {
            settlement: settlement_for(hand),
            kind,
            persisted: false,
        });
        self.settle_pending()
    }

    fn settle_pending(&mut self) -> Result<(), EngineError> {
        let Some(mut pending) = self.pending.take() else {
            return Ok(());
        };
        let Some(hand) = self.hand.as_ref() else {
            self.pending = Some(pending);
            return Err(ActionError::HandNotInProgress.into());
        };

        if !pending.persisted {
            if let Err(err) = persist(self.checkpoints.as_mut(), pending.kind, hand) {
                self.pending = Some(pending);
                return Err(err);
            }
            pending.persisted = true;
        }

        if let Err(err) = self.ledger.settle(&pending.settlement) {
            tracing::error!(
                hand_id = %pending.settlement.hand_id,
                error = %err,
                "ledger settlement failed; hand left pending"
            );
            self.pending = Some(pending);
            return Err(EngineError::Ledger(err.to_string()));
        }

        for seat in hand.seats() {
            if let Some(table_seat) = self.seats.get_mut(&seat.seat_id) {
                table_seat.stack = seat.chips_remaining;
            }
        }
        let event = hand.result().map(|result| HandEvent::HandFinished {
            hand_id: hand.id().to_string(),
            result: result.clone(),
        });
        tracing::info!(hand_id = %pending.settlement.hand_id, "hand settled");
        if let Some(event) = event {
            self.events.publish(event);
        }
        Ok(())
    }

    fn flush_events(&mut self) {
        if let Some(hand) = self.hand.as_mut() {
            let events = hand.take_events();
            self.publish_all(events);
        }
    }

    fn publish_all(&mut self, events: Vec<HandEvent>) {
        for event in events {
            self.events.publish(event);
        }
    }
}

fn persist(
    checkpoints: &mut dyn CheckpointSink,
    kind: CheckpointKind,
    hand: &Hand,
) -> Result<(), EngineError> {
    let checkpoint = HandCheckpoint::new(kind, hand);
    checkpoints.save(&checkpoint).map_err(|e| {
        tracing::error!(hand_id = hand.id(), kind = ?kind, error = %e, "checkpoint failed");
        EngineError::Persistence(e.to_string())
    })
}

/// What a seat held before the hand, whether or not it has been paid out.
fn pre_hand_stack(hand: &Hand, seat: &Seat) -> u32 {
    let paid = hand.result().map(|r| r.payout(seat.seat_id)).unwrap_or(0);
    u32::try_from(seat.starting_stack().saturating_sub(paid)).unwrap_or(u32::MAX)
}

/// Ledger movements for a finished hand: what each seat put in and got back.
pub fn settlement_for(hand: &Hand) -> Settlement {
    let result = hand.result();
    let entries = hand
        .seats()
        .iter()
        .map(|seat| SettlementEntry {
            seat_id: seat.seat_id,
            debit: seat.chips_in_pot as u64,
            credit: result.map(|r| r.payout(seat.seat_id)).unwrap_or(0),
        })
        .filter(|e| e.debit > 0 || e.credit > 0)
        .collect();
    Settlement {
        hand_id: hand.id().to_string(),
        entries,
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("config", &self.config)
            .field("seats", &self.seats)
            .field("button", &self.button)
            .field("hand", &self.hand.as_ref().map(Hand::id))
            .field("pending", &self.pending_settlement())
            .finish()
    }
}
