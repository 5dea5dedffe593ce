use holdem_engine::errors::EngineError;
use thiserror::Error;

use crate::settings::SettingsError;

#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Table {0} is no longer running")]
    Closed(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl TableError {
    /// The engine error behind this failure, if any.
    pub fn engine(&self) -> Option<&EngineError> {
        match self {
            TableError::Engine(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the caller sent an action the rules reject.
    pub fn is_rejected_action(&self) -> bool {
        self.engine().is_some_and(EngineError::is_validation)
    }
}
