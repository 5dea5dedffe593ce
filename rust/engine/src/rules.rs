use serde::{Deserialize, Serialize};

use crate::errors::ActionError;
use crate::player::PlayerAction as A;

/// What a seat faces when it is asked to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionContext {
    /// Chips left behind
    pub stack: u32,
    /// Chips already committed in this betting round
    pub committed: u32,
    /// Highest per-round commitment at the table
    pub current_to_call: u32,
    /// Smallest legal raise-to for a non-all-in raise
    pub min_raise_to: u32,
}

impl ActionContext {
    pub fn owed(&self) -> u32 {
        self.current_to_call.saturating_sub(self.committed)
    }

    /// Round total if the seat shoves.
    pub fn all_in_to(&self) -> u32 {
        self.committed + self.stack
    }
}

/// An action after validation, with the chip movement resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatedAction {
    Fold,
    Check,
    /// Puts in exactly the amount owed
    Call(u32),
    /// Raises the round total to `to`, putting in `delta`
    Raise { to: u32, delta: u32 },
    /// Commits the whole stack, reaching round total `to`
    AllIn { to: u32, delta: u32 },
}

/// Validates a player action against the seat's stack and the betting round.
///
/// A call the seat cannot cover becomes an all-in call, and a raise-to that
/// uses the whole stack becomes an all-in; a call with nothing owed is
/// treated as a check.
///
/// # Errors
///
/// - [`ActionError::CheckNotAllowed`] when checking while owing chips
/// - [`ActionError::InvalidAmount`] for a raise to zero
/// - [`ActionError::AmountBelowMinimumRaise`] when the raise-to does not
///   exceed the current bet, or falls short of `min_raise_to`
/// - [`ActionError::InsufficientChips`] when the raise needs more than the stack
///
/// # Examples
///
/// ```
/// use holdem_engine::player::PlayerAction;
/// use holdem_engine::rules::{validate_action, ActionContext, ValidatedAction};
///
/// let ctx = ActionContext { stack: 1000, committed: 20, current_to_call: 60, min_raise_to: 100 };
/// assert_eq!(validate_action(&ctx, PlayerAction::Call), Ok(ValidatedAction::Call(40)));
/// assert_eq!(
///     validate_action(&ctx, PlayerAction::Raise(100)),
///     Ok(ValidatedAction::Raise { to: 100, delta: 80 })
/// );
/// assert!(validate_action(&ctx, PlayerAction::Raise(80)).is_err());
/// ```
pub fn validate_action(ctx: &ActionContext, action: A) -> Result<ValidatedAction, ActionError> {
    let owed = ctx.owed();
    let all_in = ValidatedAction::AllIn {
        to: ctx.all_in_to(),
        delta: ctx.stack,
    };
    match action {
        A::Fold => Ok(ValidatedAction::Fold),
        A::Check => {
            if owed == 0 {
                Ok(ValidatedAction::Check)
            } else {
                Err(ActionError::CheckNotAllowed { to_call: owed })
            }
        }
        A::Call => {
            if owed == 0 {
                Ok(ValidatedAction::Check)
            } else if ctx.stack <= owed {
                Ok(all_in)
            } else {
                Ok(ValidatedAction::Call(owed))
            }
        }
        A::Raise(to) => {
            if to == 0 {
                return Err(ActionError::InvalidAmount { amount: to });
            }
            if to <= ctx.current_to_call {
                return Err(ActionError::AmountBelowMinimumRaise {
                    amount: to,
                    minimum: ctx.min_raise_to.max(ctx.current_to_call + 1),
                });
            }
            let delta = to - ctx.committed;
            if delta > ctx.stack {
                return Err(ActionError::InsufficientChips {
                    needed: delta,
                    available: ctx.stack,
                });
            }
            if delta == ctx.stack {
                return Ok(all_in);
            }
            if to < ctx.min_raise_to {
                return Err(ActionError::AmountBelowMinimumRaise {
                    amount: to,
                    minimum: ctx.min_raise_to,
                });
            }
            Ok(ValidatedAction::Raise { to, delta })
        }
        A::AllIn => {
            if ctx.stack == 0 {
                return Err(ActionError::InsufficientChips {
                    needed: 1,
                    available: 0,
                });
            }
            Ok(all_in)
        }
    }
}
