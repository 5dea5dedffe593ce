use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::player::SeatId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No account for seat {0}")]
    UnknownAccount(SeatId),
    #[error("Seat {seat} holds {balance}, cannot debit {amount}")]
    InsufficientFunds { seat: SeatId, balance: u64, amount: u64 },
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Chip movement for one seat when a hand settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementEntry {
    pub seat_id: SeatId,
    /// Chips the seat put into the pot
    pub debit: u64,
    /// Chips the seat won back
    pub credit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub hand_id: String,
    pub entries: Vec<SettlementEntry>,
}

impl Settlement {
    /// Credits minus debits; zero for any chip-conserving hand without rake.
    pub fn net(&self) -> i128 {
        self.entries
            .iter()
            .map(|e| e.credit as i128 - e.debit as i128)
            .sum()
    }
}

/// Bankroll collaborator holding each seat's chips between hands.
pub trait ChipLedger: Send {
    fn debit(&mut self, seat: SeatId, amount: u64) -> Result<(), LedgerError>;
    fn credit(&mut self, seat: SeatId, amount: u64) -> Result<(), LedgerError>;

    /// Applies a whole hand's settlement or nothing at all.
    ///
    /// The default applies every debit, then every credit, and on failure
    /// reverses the steps already taken before reporting the error.
    fn settle(&mut self, settlement: &Settlement) -> Result<(), LedgerError> {
        let mut done: Vec<(SeatId, u64, bool)> = Vec::new();
        let steps = settlement
            .entries
            .iter()
            .filter(|e| e.debit > 0)
            .map(|e| (e.seat_id, e.debit, true))
            .chain(
                settlement
                    .entries
                    .iter()
                    .filter(|e| e.credit > 0)
                    .map(|e| (e.seat_id, e.credit, false)),
            );
        for (seat, amount, is_debit) in steps {
            let res = if is_debit {
                self.debit(seat, amount)
            } else {
                self.credit(seat, amount)
            };
            if let Err(err) = res {
                for &(seat, amount, was_debit) in done.iter().rev() {
                    let undo = if was_debit {
                        self.credit(seat, amount)
                    } else {
                        self.debit(seat, amount)
                    };
                    if let Err(undo_err) = undo {
                        tracing::error!(
                            hand_id = %settlement.hand_id,
                            seat = seat,
                            error = %undo_err,
                            "failed to roll back partial settlement"
                        );
                    }
                }
                return Err(err);
            }
            done.push((seat, amount, is_debit));
        }
        Ok(())
    }
}

/// Balances kept in a map, for tests and single-process tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryLedger {
    balances: BTreeMap<SeatId, u64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balances<I: IntoIterator<Item = (SeatId, u64)>>(balances: I) -> Self {
        Self {
            balances: balances.into_iter().collect(),
        }
    }

    pub fn balance(&self, seat: SeatId) -> Option<u64> {
        self.balances.get(&seat).copied()
    }

    pub fn total(&self) -> u64 {
        self.balances.values().sum()
    }
}

impl ChipLedger for InMemoryLedger {
    fn debit(&mut self, seat: SeatId, amount: u64) -> Result<(), LedgerError> {
        let balance = self
            .balances
            .get_mut(&seat)
            .ok_or(LedgerError::UnknownAccount(seat))?;
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds {
                seat,
                balance: *balance,
                amount,
            });
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, seat: SeatId, amount: u64) -> Result<(), LedgerError> {
        let balance = self
            .balances
            .get_mut(&seat)
            .ok_or(LedgerError::UnknownAccount(seat))?;
        *balance += amount;
        Ok(())
    }
}

/// Lets several owners (a table and its tests) share one ledger.
impl<L: ChipLedger> ChipLedger for Arc<Mutex<L>> {
    fn debit(&mut self, seat: SeatId, amount: u64) -> Result<(), LedgerError> {
        self.lock()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".into()))?
            .debit(seat, amount)
    }

    fn credit(&mut self, seat: SeatId, amount: u64) -> Result<(), LedgerError> {
        self.lock()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".into()))?
            .credit(seat, amount)
    }

    fn settle(&mut self, settlement: &Settlement) -> Result<(), LedgerError> {
        self.lock()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".into()))?
            .settle(settlement)
    }
}
