use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

pub const MIN_SEATS: u8 = 2;
pub const MAX_SEATS: u8 = 9;

/// How large a raise has to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinRaiseRule {
    /// No-limit rule: the increment must be at least the big blind and at
    /// least the previous full raise increment in the round.
    #[default]
    FullRaise,
    /// Any raise-to strictly above the current bet is accepted.
    AnyIncrease,
}

/// Stakes and seating limits for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub small_blind: u32,
    pub big_blind: u32,
    pub max_seats: u8,
    /// Fixed shuffle seed for reproducible harness runs; `None` in production
    pub seed: Option<u64>,
    pub min_raise_rule: MinRaiseRule,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            small_blind: 10,
            big_blind: 20,
            max_seats: MAX_SEATS,
            seed: None,
            min_raise_rule: MinRaiseRule::FullRaise,
        }
    }
}

impl TableConfig {
    pub fn with_blinds(small_blind: u32, big_blind: u32) -> Self {
        Self {
            small_blind,
            big_blind,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.small_blind == 0 {
            return Err(EngineError::InvalidConfig(
                "small_blind must be greater than 0".into(),
            ));
        }
        if self.big_blind < self.small_blind {
            return Err(EngineError::InvalidConfig(
                "big_blind must be at least small_blind".into(),
            ));
        }
        if !(MIN_SEATS..=MAX_SEATS).contains(&self.max_seats) {
            return Err(EngineError::InvalidConfig(format!(
                "max_seats must be between {MIN_SEATS} and {MAX_SEATS}"
            )));
        }
        Ok(())
    }
}
