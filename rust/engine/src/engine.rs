use serde::{Deserialize, Serialize};

use crate::betting::{AppliedAction, BettingRound, RoundState};
use crate::cards::Card;
use crate::config::TableConfig;
use crate::deck::Deck;
use crate::errors::{ActionError, EngineError};
use crate::events::{FinishReason, HandEvent, HandResult, SeatInfo, ShownHand};
use crate::hand::{evaluate_hand, HandRank};
use crate::logger::{ActionKind, ActionRecord, Street};
use crate::player::{PlayerAction, Position, Seat, SeatId, SeatStatus, TableSeat};
use crate::pot::{PotEntry, PotManager};
use crate::rules::ValidatedAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandStatus {
    InProgress,
    Finished,
    /// Stopped by a structural failure; needs recovery or abort
    Halted,
}

/// An action the seat to act may currently take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegalAction {
    Fold,
    Check,
    Call { amount: u32 },
    Raise { min_to: u32, max_to: u32 },
    AllIn { amount: u32 },
}

/// Read-only snapshot of a hand for broadcast and inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandState {
    pub id: String,
    pub dealer_seat: SeatId,
    pub pot: u64,
    pub current_round: Street,
    pub status: HandStatus,
    pub community_cards: Vec<Card>,
    pub seats: Vec<Seat>,
    pub to_act: Option<SeatId>,
    pub current_to_call: u32,
    pub legal_actions: Vec<LegalAction>,
    pub actions: Vec<ActionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<HandResult>,
}

impl HandState {
    pub fn seat(&self, seat_id: SeatId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.seat_id == seat_id)
    }
}

/// One hand of Texas Hold'em from blinds to payout.
///
/// The hand owns its deck, seats and betting round exclusively. Every
/// community card comes from the same deck the hole cards were dealt from.
///
/// # Examples
///
/// ```
/// use holdem_engine::config::TableConfig;
/// use holdem_engine::deck::Deck;
/// use holdem_engine::engine::{Hand, HandStatus};
/// use holdem_engine::player::{PlayerAction, TableSeat};
///
/// let seats = [TableSeat::new(0, 1000), TableSeat::new(1, 1000)];
/// let mut hand = Hand::start(
///     "20250101-000001".into(),
///     TableConfig::with_blinds(10, 20),
///     &seats,
///     0,
///     Deck::new_with_seed(7),
/// )
/// .unwrap();
///
/// // Heads-up: the button posts the small blind and acts first preflop.
/// assert_eq!(hand.to_act(), Some(0));
/// hand.apply_action(0, PlayerAction::Fold).unwrap();
/// assert_eq!(hand.status(), HandStatus::Finished);
/// assert_eq!(hand.seat(1).unwrap().chips_remaining, 1010);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    id: String,
    config: TableConfig,
    dealer_seat: SeatId,
    /// Clockwise by seat id
    seats: Vec<Seat>,
    deck: Deck,
    community: Vec<Card>,
    street: Street,
    status: HandStatus,
    #[serde(default)]
    halt_reason: Option<String>,
    betting: BettingRound,
    actions: Vec<ActionRecord>,
    starting_total: u64,
    #[serde(default)]
    result: Option<HandResult>,
    #[serde(skip)]
    pending: Vec<HandEvent>,
    #[serde(skip)]
    streets_dealt: Vec<Street>,
}

impl Hand {
    /// Seats the players, deals two hole cards each, posts the blinds and
    /// opens preflop betting.
    ///
    /// Seats with no chips or flagged as sitting out are kept for the record
    /// but dealt out. `dealer_seat` must be one of the seats dealt in.
    pub fn start(
        id: String,
        config: TableConfig,
        table_seats: &[TableSeat],
        dealer_seat: SeatId,
        deck: Deck,
    ) -> Result<Self, EngineError> {
        let mut sorted = table_seats.to_vec();
        sorted.sort_by_key(|s| s.seat_id);
        sorted.dedup_by_key(|s| s.seat_id);
        let seats: Vec<Seat> = sorted.iter().map(Seat::new).collect();

        let playing = seats.iter().filter(|s| s.can_act()).count();
        if playing < 2 {
            return Err(EngineError::NotEnoughSeats { found: playing });
        }
        let dealer_idx = seats
            .iter()
            .position(|s| s.seat_id == dealer_seat && s.can_act())
            .ok_or(EngineError::UnknownSeatReference(dealer_seat))?;

        let starting_total = seats.iter().map(Seat::starting_stack).sum();
        let betting = BettingRound::new(
            Street::Preflop,
            seats.len(),
            config.big_blind,
            config.min_raise_rule,
        );
        let mut hand = Self {
            id,
            config,
            dealer_seat,
            seats,
            deck,
            community: Vec::with_capacity(5),
            street: Street::Preflop,
            status: HandStatus::InProgress,
            halt_reason: None,
            betting,
            actions: Vec::new(),
            starting_total,
            result: None,
            pending: Vec::new(),
            streets_dealt: Vec::new(),
        };

        // Button first, then clockwise
        let order = hand.clockwise_from(dealer_idx);
        for (distance, &idx) in order.iter().enumerate() {
            hand.seats[idx].position = Some(Position::from_button_distance(distance, order.len()));
        }
        hand.pending.push(HandEvent::HandStarted {
            hand_id: hand.id.clone(),
            dealer_seat,
            seats: hand
                .seats
                .iter()
                .filter(|s| s.can_act())
                .map(|s| SeatInfo {
                    seat_id: s.seat_id,
                    stack: s.chips_remaining,
                    position: s.position,
                })
                .collect(),
        });
        tracing::info!(
            hand_id = %hand.id,
            dealer = dealer_seat,
            players = order.len(),
            seed = ?hand.deck.seed(),
            "hand started"
        );

        hand.deal_hole_cards(&order)?;
        hand.post_blinds(&order)?;
        hand.check_conservation()?;
        hand.advance()?;
        Ok(hand)
    }

    fn deal_hole_cards(&mut self, order: &[usize]) -> Result<(), EngineError> {
        // One card at a time, starting left of the button
        let mut deal_order = order[1..].to_vec();
        deal_order.push(order[0]);
        let mut dealt: Vec<Vec<Card>> = vec![Vec::with_capacity(2); self.seats.len()];
        for _ in 0..2 {
            for &idx in &deal_order {
                dealt[idx].push(self.deck.deal_card()?);
            }
        }
        for &idx in &deal_order {
            let cards = [dealt[idx][0], dealt[idx][1]];
            self.seats[idx].hole_cards = Some(cards);
            self.pending.push(HandEvent::HoleCardsDealt {
                hand_id: self.id.clone(),
                seat_id: self.seats[idx].seat_id,
                cards,
            });
        }
        Ok(())
    }

    fn post_blinds(&mut self, order: &[usize]) -> Result<(), EngineError> {
        let (sb, bb) = if order.len() == 2 {
            (order[0], order[1])
        } else {
            (order[1], order[2])
        };
        let mut posted = Vec::with_capacity(2);
        for (idx, amount) in [(sb, self.config.small_blind), (bb, self.config.big_blind)] {
            let paid = self.betting.post_blind(&mut self.seats, idx, amount);
            posted.push(AppliedAction {
                seat_id: self.seats[idx].seat_id,
                action: ValidatedAction::Call(paid),
                chips: paid,
                street_total: self.betting.committed(idx),
                aggressive: false,
            });
        }
        let bb_pos = order.iter().position(|&i| i == bb).unwrap_or(0);
        let first = order[(bb_pos + 1) % order.len()];
        self.betting.open(&self.seats, first);
        for applied in posted {
            self.record(applied, true);
        }
        Ok(())
    }

    /// Applies a seat's action, then deals on or finishes the hand as far
    /// as it can go without further input.
    ///
    /// Validation failures ([`EngineError::Action`]) leave the hand
    /// untouched. Structural failures halt it.
    pub fn apply_action(&mut self, seat_id: SeatId, action: PlayerAction) -> Result<(), EngineError> {
        self.ensure_in_progress()?;
        let applied = match self.betting.apply(&mut self.seats, seat_id, action) {
            Ok(applied) => applied,
            Err(err) => {
                tracing::warn!(
                    hand_id = %self.id,
                    seat = seat_id,
                    action = ?action,
                    reason = err.code(),
                    "rejected action"
                );
                return Err(err.into());
            }
        };
        self.record(applied, false);
        self.advance_or_halt()
    }

    /// Acts for a seat whose timer ran out: check when that is free,
    /// otherwise fold.
    pub fn force_timeout(&mut self, seat_id: SeatId) -> Result<(), EngineError> {
        self.ensure_in_progress()?;
        let idx = self.seat_index(seat_id).map_err(|_| ActionError::UnknownSeat(seat_id))?;
        let owed = self.betting.context(&self.seats, idx).owed();
        let action = if owed == 0 {
            PlayerAction::Check
        } else {
            PlayerAction::Fold
        };
        let applied = self.betting.apply(&mut self.seats, seat_id, action)?;
        tracing::warn!(hand_id = %self.id, seat = seat_id, action = ?action, "forced action on timeout");
        self.record(applied, true);
        self.advance_or_halt()
    }

    /// Ends the hand early without further dealing.
    ///
    /// A single seat still contesting takes the whole pot; otherwise every
    /// seat gets its contribution back. Halted hands can be aborted too.
    pub fn abort(&mut self, reason: &str) -> Result<(), EngineError> {
        if self.status == HandStatus::Finished {
            return Err(ActionError::HandNotInProgress.into());
        }
        let contesting: Vec<usize> = (0..self.seats.len())
            .filter(|&i| self.seats[i].in_hand())
            .collect();
        tracing::warn!(hand_id = %self.id, reason, contesting = contesting.len(), "aborting hand");

        if contesting.len() == 1 {
            let entries = self.pot_entries(|_| None);
            return self.pay_out(FinishReason::Aborted, &entries, Vec::new());
        }

        let payouts: Vec<(SeatId, u64)> = self
            .seats
            .iter()
            .filter(|s| s.chips_in_pot > 0)
            .map(|s| (s.seat_id, s.chips_in_pot as u64))
            .collect();
        for seat in &mut self.seats {
            seat.chips_remaining += seat.chips_in_pot;
        }
        let pot = self.pot();
        self.finish(HandResult {
            reason: FinishReason::Aborted,
            pot,
            awards: Vec::new(),
            payouts,
            shown: Vec::new(),
        })
    }

    /// Legal actions for `seat_id`; empty unless it is that seat's turn.
    pub fn legal_actions(&self, seat_id: SeatId) -> Vec<LegalAction> {
        if self.status != HandStatus::InProgress || self.to_act() != Some(seat_id) {
            return Vec::new();
        }
        let Ok(idx) = self.seat_index(seat_id) else {
            return Vec::new();
        };
        let ctx = self.betting.context(&self.seats, idx);
        let owed = ctx.owed();
        let mut out = Vec::new();
        if owed == 0 {
            out.push(LegalAction::Check);
        } else {
            out.push(LegalAction::Fold);
            if ctx.stack > owed {
                out.push(LegalAction::Call { amount: owed });
            }
        }
        if ctx.stack > owed && ctx.min_raise_to < ctx.all_in_to() {
            out.push(LegalAction::Raise {
                min_to: ctx.min_raise_to,
                max_to: ctx.all_in_to(),
            });
        }
        out.push(LegalAction::AllIn { amount: ctx.stack });
        out
    }

    pub fn snapshot(&self) -> HandState {
        let to_act = self.to_act();
        HandState {
            id: self.id.clone(),
            dealer_seat: self.dealer_seat,
            pot: self.pot(),
            current_round: self.street,
            status: self.status,
            community_cards: self.community.clone(),
            seats: self.seats.clone(),
            to_act,
            current_to_call: self.betting.current_to_call(),
            legal_actions: to_act.map(|s| self.legal_actions(s)).unwrap_or_default(),
            actions: self.actions.clone(),
            result: self.result.clone(),
        }
    }

    /// Snapshot as `viewer` may see it: hole cards stay hidden except the
    /// viewer's own and those shown down at showdown. `None` is an observer.
    pub fn snapshot_for(&self, viewer: Option<SeatId>) -> HandState {
        let mut state = self.snapshot();
        let shown: Vec<SeatId> = self
            .result
            .iter()
            .flat_map(|r| r.shown.iter().map(|s| s.seat_id))
            .collect();
        for seat in &mut state.seats {
            if Some(seat.seat_id) != viewer && !shown.contains(&seat.seat_id) {
                seat.hole_cards = None;
            }
        }
        state
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> HandStatus {
        self.status
    }

    pub fn street(&self) -> Street {
        self.street
    }

    pub fn dealer_seat(&self) -> SeatId {
        self.dealer_seat
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn seat(&self, seat_id: SeatId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.seat_id == seat_id)
    }

    pub fn community(&self) -> &[Card] {
        &self.community
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }

    pub fn result(&self) -> Option<&HandResult> {
        self.result.as_ref()
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    pub fn starting_total(&self) -> u64 {
        self.starting_total
    }

    /// Sum of all contributions so far.
    pub fn pot(&self) -> u64 {
        self.seats.iter().map(|s| s.chips_in_pot as u64).sum()
    }

    pub fn to_act(&self) -> Option<SeatId> {
        if self.status != HandStatus::InProgress {
            return None;
        }
        self.betting.to_act(&self.seats)
    }

    /// Events produced since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<HandEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Streets dealt since the last call; each marks a checkpoint.
    pub fn take_streets_dealt(&mut self) -> Vec<Street> {
        std::mem::take(&mut self.streets_dealt)
    }

    fn ensure_in_progress(&self) -> Result<(), EngineError> {
        match self.status {
            HandStatus::InProgress => Ok(()),
            HandStatus::Finished => Err(ActionError::HandNotInProgress.into()),
            HandStatus::Halted => Err(EngineError::HandHalted {
                hand_id: self.id.clone(),
                reason: self.halt_reason.clone().unwrap_or_default(),
            }),
        }
    }

    fn record(&mut self, applied: AppliedAction, forced: bool) {
        let kind = match applied.action {
            ValidatedAction::Fold => ActionKind::Fold,
            ValidatedAction::Check => ActionKind::Check,
            ValidatedAction::Call(_) => ActionKind::Call,
            ValidatedAction::Raise { .. } => ActionKind::Raise,
            ValidatedAction::AllIn { .. } => ActionKind::AllIn,
        };
        let record = ActionRecord {
            seat_id: applied.seat_id,
            kind,
            amount: applied.chips,
            street_total: applied.street_total,
            street: self.street,
            forced,
        };
        tracing::debug!(
            hand_id = %self.id,
            seat = record.seat_id,
            street = ?record.street,
            kind = ?record.kind,
            amount = record.amount,
            forced,
            "action applied"
        );
        self.actions.push(record.clone());
        self.pending.push(HandEvent::ActionApplied {
            hand_id: self.id.clone(),
            record,
            pot: self.pot(),
            next_to_act: self.betting.to_act(&self.seats),
        });
    }

    fn advance_or_halt(&mut self) -> Result<(), EngineError> {
        let res = self.check_conservation().and_then(|_| self.advance());
        if let Err(err) = &res {
            if err.is_fatal() {
                self.halt(err);
            }
        }
        res
    }

    fn halt(&mut self, err: &EngineError) {
        tracing::error!(hand_id = %self.id, error = %err, "hand halted");
        self.status = HandStatus::Halted;
        self.halt_reason = Some(err.to_string());
        self.pending.push(HandEvent::HandHalted {
            hand_id: self.id.clone(),
            reason: err.to_string(),
        });
    }

    /// Runs the hand forward until a seat has to act or it is over.
    fn advance(&mut self) -> Result<(), EngineError> {
        loop {
            match self.betting.state(&self.seats) {
                RoundState::AwaitingAction(_) => return Ok(()),
                RoundState::HandCompleteByElimination => return self.finish_by_elimination(),
                RoundState::RoundComplete => {
                    let Some((next, count)) = self.street.next() else {
                        return Ok(());
                    };
                    if next == Street::Showdown {
                        return self.showdown();
                    }
                    self.deal_street(next, count)?;
                }
            }
        }
    }

    fn deal_street(&mut self, street: Street, count: usize) -> Result<(), EngineError> {
        let dealt = self.deck.draw(count)?;
        self.community.extend_from_slice(&dealt);
        self.street = street;
        self.betting = BettingRound::new(
            street,
            self.seats.len(),
            self.config.big_blind,
            self.config.min_raise_rule,
        );
        let dealer_idx = self.seat_index(self.dealer_seat)?;
        self.betting
            .open(&self.seats, (dealer_idx + 1) % self.seats.len());
        self.streets_dealt.push(street);
        tracing::info!(
            hand_id = %self.id,
            street = ?street,
            board = %format_cards(&self.community),
            "street dealt"
        );
        self.pending.push(HandEvent::RoundAdvanced {
            hand_id: self.id.clone(),
            street,
            dealt,
            board: self.community.clone(),
        });
        Ok(())
    }

    fn finish_by_elimination(&mut self) -> Result<(), EngineError> {
        let entries = self.pot_entries(|_| None);
        self.pay_out(FinishReason::Elimination, &entries, Vec::new())
    }

    fn showdown(&mut self) -> Result<(), EngineError> {
        self.street = Street::Showdown;
        let mut shown = Vec::new();
        let mut ranks = Vec::new();
        for seat in self.seats.iter().filter(|s| s.in_hand()) {
            let hole = seat
                .hole_cards
                .ok_or(EngineError::UnknownSeatReference(seat.seat_id))?;
            let mut cards = hole.to_vec();
            cards.extend_from_slice(&self.community);
            let rank = evaluate_hand(&cards)?;
            shown.push(ShownHand {
                seat_id: seat.seat_id,
                cards: hole,
                description: rank.describe(),
            });
            ranks.push((seat.seat_id, rank));
        }
        let entries = self.pot_entries(|seat| {
            ranks
                .iter()
                .find(|(s, _)| *s == seat)
                .map(|(_, rank)| *rank)
        });
        self.pay_out(FinishReason::Showdown, &entries, shown)
    }

    fn pot_entries<F>(&self, hand_of: F) -> Vec<PotEntry>
    where
        F: Fn(SeatId) -> Option<HandRank>,
    {
        self.seats
            .iter()
            .filter(|s| s.status != SeatStatus::SittingOut)
            .map(|s| PotEntry {
                seat_id: s.seat_id,
                contribution: s.chips_in_pot,
                folded: !s.in_hand(),
                hand: hand_of(s.seat_id),
            })
            .collect()
    }

    fn pay_out(
        &mut self,
        reason: FinishReason,
        entries: &[PotEntry],
        shown: Vec<ShownHand>,
    ) -> Result<(), EngineError> {
        let pots = PotManager::from_entries(entries);
        let dist = pots.distribute(entries, self.dealer_seat)?;
        for (&seat_id, &amount) in &dist.payouts {
            let idx = self.seat_index(seat_id)?;
            let seat = &mut self.seats[idx];
            seat.chips_remaining = u32::try_from(amount)
                .ok()
                .and_then(|a| seat.chips_remaining.checked_add(a))
                .ok_or(EngineError::ChipConservation {
                    expected: self.starting_total,
                    actual: amount,
                })?;
        }
        let pot = pots.total();
        self.finish(HandResult {
            reason,
            pot,
            awards: dist.awards,
            payouts: dist.payouts.into_iter().collect(),
            shown,
        })
    }

    fn finish(&mut self, result: HandResult) -> Result<(), EngineError> {
        self.status = HandStatus::Finished;
        self.halt_reason = None;
        self.check_conservation()?;
        tracing::info!(
            hand_id = %self.id,
            reason = ?result.reason,
            pot = result.pot,
            winners = ?result.winners(),
            "hand finished"
        );
        self.result = Some(result);
        Ok(())
    }

    /// Stacks plus chips still in the pot must equal what the seats started with.
    fn check_conservation(&self) -> Result<(), EngineError> {
        let behind: u64 = self.seats.iter().map(|s| s.chips_remaining as u64).sum();
        let actual = if self.status == HandStatus::Finished {
            behind
        } else {
            behind + self.pot()
        };
        if actual != self.starting_total {
            return Err(EngineError::ChipConservation {
                expected: self.starting_total,
                actual,
            });
        }
        Ok(())
    }

    fn seat_index(&self, seat_id: SeatId) -> Result<usize, EngineError> {
        self.seats
            .iter()
            .position(|s| s.seat_id == seat_id)
            .ok_or(EngineError::UnknownSeatReference(seat_id))
    }

    /// Indices of seats dealt in, clockwise, starting at `start`.
    fn clockwise_from(&self, start: usize) -> Vec<usize> {
        let n = self.seats.len();
        (0..n)
            .map(|k| (start + k) % n)
            .filter(|&i| self.seats[i].can_act())
            .collect()
    }
}

fn format_cards(cards: &[Card]) -> String {
    cards
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
