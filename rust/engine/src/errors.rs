use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::player::SeatId;

/// Validation failures for a single client action.
///
/// These are recoverable: the hand state is left untouched and the error is
/// reported back to the acting seat only.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum ActionError {
    #[error("It's not seat {actual}'s turn (expected seat {expected})")]
    WrongTurn { expected: SeatId, actual: SeatId },
    #[error("Insufficient chips: need {needed}, have {available}")]
    InsufficientChips { needed: u32, available: u32 },
    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: u32 },
    #[error("Raise to {amount} is below the minimum of {minimum}")]
    AmountBelowMinimumRaise { amount: u32, minimum: u32 },
    #[error("Cannot check while facing {to_call} to call")]
    CheckNotAllowed { to_call: u32 },
    #[error("Seat {seat} has already acted and has nothing to respond to")]
    AlreadyActed { seat: SeatId },
    #[error("No hand in progress")]
    HandNotInProgress,
    #[error("Seat {0} is not dealt into this hand")]
    UnknownSeat(SeatId),
}

impl ActionError {
    /// Stable machine-readable code, suitable for client error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::WrongTurn { .. } => "wrong_turn",
            ActionError::InsufficientChips { .. } => "insufficient_chips",
            ActionError::InvalidAmount { .. } => "invalid_amount",
            ActionError::AmountBelowMinimumRaise { .. } => "amount_below_minimum_raise",
            ActionError::CheckNotAllowed { .. } => "check_not_allowed",
            ActionError::AlreadyActed { .. } => "already_acted_this_state",
            ActionError::HandNotInProgress => "hand_not_in_progress",
            ActionError::UnknownSeat(_) => "unknown_seat",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("Deck exhausted: requested {requested}, {remaining} remaining")]
    DeckExhausted { requested: usize, remaining: usize },
    #[error("Hand evaluation needs 5 to 7 cards, got {count}")]
    InsufficientCards { count: usize },
    #[error("Chip conservation violated: expected {expected}, found {actual}")]
    ChipConservation { expected: u64, actual: u64 },
    #[error("Internal reference to unknown seat {0}")]
    UnknownSeatReference(SeatId),
    #[error("At least two seats with chips are required, found {found}")]
    NotEnoughSeats { found: usize },
    #[error("Hand {hand_id} is already in progress")]
    HandAlreadyInProgress { hand_id: String },
    #[error("Hand {hand_id} has finished but is not settled yet")]
    SettlementPending { hand_id: String },
    #[error("Hand {hand_id} is halted: {reason}")]
    HandHalted { hand_id: String, reason: String },
    #[error("Invalid table configuration: {0}")]
    InvalidConfig(String),
    #[error("Chip ledger failure: {0}")]
    Ledger(String),
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl EngineError {
    /// Structural failures that halt the hand until it is recovered or aborted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::DeckExhausted { .. }
                | EngineError::InsufficientCards { .. }
                | EngineError::ChipConservation { .. }
                | EngineError::UnknownSeatReference(_)
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Action(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_errors_serialize_with_reason_tag() {
        let json = serde_json::to_value(ActionError::CheckNotAllowed { to_call: 40 }).unwrap();
        assert_eq!(json["reason"], "check_not_allowed");
        assert_eq!(json["detail"]["to_call"], 40);
        let json = serde_json::to_value(ActionError::UnknownSeat(4)).unwrap();
        assert_eq!(json["detail"], 4);
    }

    #[test]
    fn structural_errors_are_fatal_and_validation_is_not() {
        assert!(EngineError::DeckExhausted {
            requested: 3,
            remaining: 1
        }
        .is_fatal());
        let rejected = EngineError::from(ActionError::HandNotInProgress);
        assert!(rejected.is_validation());
        assert!(!rejected.is_fatal());
        assert!(!EngineError::Ledger("down".into()).is_fatal());
    }
}
