//! Betting round state machine.
//!
//! One [`BettingRound`] covers a single street. It tracks each seat's
//! commitment for the street, who still owes a response, and whose turn it
//! is. Seats are addressed by their index in the hand's clockwise seat list.

use serde::{Deserialize, Serialize};

use crate::config::MinRaiseRule;
use crate::errors::ActionError;
use crate::logger::Street;
use crate::player::{PlayerAction, Seat, SeatId, SeatStatus};
use crate::rules::{validate_action, ActionContext, ValidatedAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "seat", rename_all = "snake_case")]
pub enum RoundState {
    AwaitingAction(SeatId),
    RoundComplete,
    /// One seat or fewer still contests the pot
    HandCompleteByElimination,
}

/// Result of applying one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedAction {
    pub seat_id: SeatId,
    pub action: ValidatedAction,
    /// Chips moved into the pot
    pub chips: u32,
    /// Seat's total for the street afterwards
    pub street_total: u32,
    /// Whether the action raised the amount to call
    pub aggressive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BettingRound {
    street: Street,
    committed: Vec<u32>,
    /// Acted since the last bet or raise
    acted: Vec<bool>,
    current_to_call: u32,
    /// Increment of the last full raise this street
    last_raise_size: u32,
    big_blind: u32,
    rule: MinRaiseRule,
    last_aggressor: Option<SeatId>,
    to_act: Option<usize>,
}

impl BettingRound {
    pub fn new(street: Street, seat_count: usize, big_blind: u32, rule: MinRaiseRule) -> Self {
        Self {
            street,
            committed: vec![0; seat_count],
            acted: vec![false; seat_count],
            current_to_call: 0,
            last_raise_size: 0,
            big_blind,
            rule,
            last_aggressor: None,
            to_act: None,
        }
    }

    pub fn street(&self) -> Street {
        self.street
    }

    pub fn current_to_call(&self) -> u32 {
        self.current_to_call
    }

    pub fn committed(&self, idx: usize) -> u32 {
        self.committed.get(idx).copied().unwrap_or(0)
    }

    pub fn last_aggressor(&self) -> Option<SeatId> {
        self.last_aggressor
    }

    /// Smallest raise-to that is not an all-in shortcut.
    pub fn min_raise_to(&self) -> u32 {
        match self.rule {
            MinRaiseRule::FullRaise => {
                self.current_to_call + self.last_raise_size.max(self.big_blind)
            }
            MinRaiseRule::AnyIncrease => self.current_to_call + 1,
        }
    }

    /// Posts a forced bet. The seat is not marked as having acted, so the
    /// big blind still gets its option.
    pub fn post_blind(&mut self, seats: &mut [Seat], idx: usize, amount: u32) -> u32 {
        let paid = seats[idx].commit(amount);
        self.committed[idx] += paid;
        self.current_to_call = self.current_to_call.max(self.committed[idx]);
        paid
    }

    /// Hands the turn to the first seat at or after `start` that owes an action.
    pub fn open(&mut self, seats: &[Seat], start: usize) {
        self.advance_from(seats, start);
    }

    pub fn state(&self, seats: &[Seat]) -> RoundState {
        if seats.iter().filter(|s| s.in_hand()).count() <= 1 {
            return RoundState::HandCompleteByElimination;
        }
        match self.to_act {
            Some(idx) => RoundState::AwaitingAction(seats[idx].seat_id),
            None => RoundState::RoundComplete,
        }
    }

    pub fn to_act(&self, seats: &[Seat]) -> Option<SeatId> {
        match self.state(seats) {
            RoundState::AwaitingAction(seat) => Some(seat),
            _ => None,
        }
    }

    pub fn context(&self, seats: &[Seat], idx: usize) -> ActionContext {
        ActionContext {
            stack: seats[idx].chips_remaining,
            committed: self.committed[idx],
            current_to_call: self.current_to_call,
            min_raise_to: self.min_raise_to(),
        }
    }

    /// Validates and applies `action` for `seat_id`.
    ///
    /// Rejections leave both the round and the seats untouched.
    pub fn apply(
        &mut self,
        seats: &mut [Seat],
        seat_id: SeatId,
        action: PlayerAction,
    ) -> Result<AppliedAction, ActionError> {
        let idx = seats
            .iter()
            .position(|s| s.seat_id == seat_id)
            .ok_or(ActionError::UnknownSeat(seat_id))?;

        if self.to_act != Some(idx) {
            if !self.needs_action(seats, idx) {
                return Err(ActionError::AlreadyActed { seat: seat_id });
            }
            let expected = self.to_act.map(|i| seats[i].seat_id).unwrap_or(seat_id);
            return Err(ActionError::WrongTurn {
                expected,
                actual: seat_id,
            });
        }

        let validated = validate_action(&self.context(seats, idx), action)?;
        let chips = match validated {
            ValidatedAction::Fold => {
                seats[idx].status = SeatStatus::Folded;
                0
            }
            ValidatedAction::Check => 0,
            ValidatedAction::Call(delta)
            | ValidatedAction::Raise { delta, .. }
            | ValidatedAction::AllIn { delta, .. } => seats[idx].commit(delta),
        };
        self.committed[idx] += chips;

        let total = self.committed[idx];
        let aggressive = total > self.current_to_call;
        if aggressive {
            let increment = total - self.current_to_call;
            if increment >= self.last_raise_size.max(self.big_blind) {
                self.last_raise_size = increment;
            }
            self.current_to_call = total;
            self.last_aggressor = Some(seat_id);
            // Everyone else has to respond to the new amount
            for (i, acted) in self.acted.iter_mut().enumerate() {
                if i != idx {
                    *acted = false;
                }
            }
        }
        self.acted[idx] = true;

        let n = seats.len();
        self.advance_from(seats, (idx + 1) % n);

        Ok(AppliedAction {
            seat_id,
            action: validated,
            chips,
            street_total: total,
            aggressive,
        })
    }

    fn needs_action(&self, seats: &[Seat], idx: usize) -> bool {
        if !seats[idx].can_act() {
            return false;
        }
        let matched = self.committed[idx] >= self.current_to_call;
        // Alone against all-in seats there is nobody left to bet against.
        let active = seats.iter().filter(|s| s.can_act()).count();
        if active <= 1 && matched {
            return false;
        }
        !self.acted[idx] || !matched
    }

    fn advance_from(&mut self, seats: &[Seat], start: usize) {
        let n = seats.len();
        self.to_act = (0..n)
            .map(|k| (start + k) % n)
            .find(|&i| self.needs_action(seats, i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::TableSeat;

    fn seats(stacks: &[u32]) -> Vec<Seat> {
        stacks
            .iter()
            .enumerate()
            .map(|(i, &s)| Seat::new(&TableSeat::new(i as SeatId, s)))
            .collect()
    }

    fn postflop(seats: &[Seat]) -> BettingRound {
        let mut round = BettingRound::new(Street::Flop, seats.len(), 20, MinRaiseRule::FullRaise);
        round.open(seats, 0);
        round
    }

    #[test]
    fn checks_around_completes_round() {
        let mut s = seats(&[1000, 1000, 1000]);
        let mut round = postflop(&s);
        for seat in 0..3 {
            assert_eq!(round.state(&s), RoundState::AwaitingAction(seat));
            round.apply(&mut s, seat, PlayerAction::Check).unwrap();
        }
        assert_eq!(round.state(&s), RoundState::RoundComplete);
    }

    #[test]
    fn raise_reopens_action_for_seat_that_checked() {
        let mut s = seats(&[1000, 1000, 1000]);
        let mut round = postflop(&s);
        round.apply(&mut s, 0, PlayerAction::Check).unwrap();
        round.apply(&mut s, 1, PlayerAction::Raise(100)).unwrap();
        round.apply(&mut s, 2, PlayerAction::Call).unwrap();

        // All chips match except seat 0, who checked before the raise.
        assert_eq!(round.state(&s), RoundState::AwaitingAction(0));
        assert_eq!(
            round.apply(&mut s, 0, PlayerAction::Check),
            Err(ActionError::CheckNotAllowed { to_call: 100 })
        );
        round.apply(&mut s, 0, PlayerAction::Call).unwrap();
        assert_eq!(round.state(&s), RoundState::RoundComplete);
        assert_eq!(round.last_aggressor(), Some(1));
    }

    #[test]
    fn re_raise_gives_earlier_caller_another_turn() {
        let mut s = seats(&[1000, 1000, 1000]);
        let mut round = postflop(&s);
        round.apply(&mut s, 0, PlayerAction::Raise(50)).unwrap();
        round.apply(&mut s, 1, PlayerAction::Call).unwrap();
        round.apply(&mut s, 2, PlayerAction::Raise(200)).unwrap();
        assert_eq!(round.state(&s), RoundState::AwaitingAction(0));
        round.apply(&mut s, 0, PlayerAction::Call).unwrap();
        assert_eq!(round.state(&s), RoundState::AwaitingAction(1));
        round.apply(&mut s, 1, PlayerAction::Fold).unwrap();
        assert_eq!(round.state(&s), RoundState::RoundComplete);
    }

    #[test]
    fn out_of_turn_and_duplicate_actions_are_rejected() {
        let mut s = seats(&[1000, 1000, 1000]);
        let mut round = postflop(&s);
        assert_eq!(
            round.apply(&mut s, 2, PlayerAction::Check),
            Err(ActionError::WrongTurn {
                expected: 0,
                actual: 2
            })
        );
        round.apply(&mut s, 0, PlayerAction::Check).unwrap();
        assert_eq!(
            round.apply(&mut s, 0, PlayerAction::Check),
            Err(ActionError::AlreadyActed { seat: 0 })
        );
        assert_eq!(
            round.apply(&mut s, 7, PlayerAction::Check),
            Err(ActionError::UnknownSeat(7))
        );
        assert_eq!(s[0].chips_remaining, 1000);
    }

    #[test]
    fn fold_to_one_seat_ends_by_elimination() {
        let mut s = seats(&[1000, 1000]);
        let mut round = postflop(&s);
        round.apply(&mut s, 0, PlayerAction::Raise(40)).unwrap();
        round.apply(&mut s, 1, PlayerAction::Fold).unwrap();
        assert_eq!(round.state(&s), RoundState::HandCompleteByElimination);
    }

    #[test]
    fn all_in_seats_are_skipped_and_lone_active_seat_stops_betting() {
        let mut s = seats(&[100, 1000, 1000]);
        let mut round = postflop(&s);
        round.apply(&mut s, 0, PlayerAction::AllIn).unwrap();
        assert_eq!(s[0].status, SeatStatus::AllIn);
        round.apply(&mut s, 1, PlayerAction::Call).unwrap();
        round.apply(&mut s, 2, PlayerAction::Fold).unwrap();
        // Seat 1 is the only one left with chips and has matched.
        assert_eq!(round.state(&s), RoundState::RoundComplete);
    }

    #[test]
    fn short_all_in_keeps_previous_raise_size() {
        let mut s = seats(&[1000, 130, 1000]);
        let mut round = postflop(&s);
        round.apply(&mut s, 0, PlayerAction::Raise(100)).unwrap();
        assert_eq!(round.min_raise_to(), 200);
        round.apply(&mut s, 1, PlayerAction::AllIn).unwrap();
        assert_eq!(round.current_to_call(), 130);
        assert_eq!(round.min_raise_to(), 230);
    }

    #[test]
    fn big_blind_keeps_option_when_limped_to() {
        let mut s = seats(&[1000, 1000, 1000]);
        let mut round = BettingRound::new(Street::Preflop, 3, 20, MinRaiseRule::FullRaise);
        round.post_blind(&mut s, 1, 10);
        round.post_blind(&mut s, 2, 20);
        round.open(&s, 0);
        round.apply(&mut s, 0, PlayerAction::Call).unwrap();
        round.apply(&mut s, 1, PlayerAction::Call).unwrap();
        assert_eq!(round.state(&s), RoundState::AwaitingAction(2));
        round.apply(&mut s, 2, PlayerAction::Check).unwrap();
        assert_eq!(round.state(&s), RoundState::RoundComplete);
    }
}
