//! # holdem-engine: Texas Hold'em Table Engine
//!
//! A No-Limit Texas Hold'em engine for tables of two to nine seats. It deals
//! from an exclusive per-hand deck, runs the betting state machine street by
//! street, ranks hands, splits main and side pots, and hands every state
//! change to pluggable collaborators for broadcast, checkpointing and chip
//! settlement.
//!
//! ## Core Modules
//!
//! - [`cards`] - Card representation (Suit, Rank, Card) and parsing
//! - [`deck`] - Per-hand deck with seeded ChaCha20 shuffling
//! - [`hand`] - Seven-card hand evaluation and comparison
//! - [`player`] - Seats, positions and player actions
//! - [`rules`] - Validation of a single action against the seat's situation
//! - [`betting`] - Betting round state machine for one street
//! - [`pot`] - Main and side pot construction and award
//! - [`engine`] - One hand from blinds to payout
//! - [`game`] - Table bookkeeping: button, hand ids, checkpoints, settlement
//! - [`events`] - Events published to clients
//! - [`ledger`] - Chip ledger collaborator
//! - [`logger`] - Action records and JSONL hand checkpoints
//! - [`config`] - Table configuration
//! - [`errors`] - Error types for game operations
//!
//! ## Quick Start
//!
//! ```rust
//! use holdem_engine::cards::Card;
//! use holdem_engine::hand::{evaluate_hand, Category};
//!
//! let cards: Vec<Card> = ["Ah", "Kh", "Qh", "Jh", "Th", "2c", "3d"]
//!     .iter()
//!     .map(|s| s.parse().unwrap())
//!     .collect();
//!
//! let strength = evaluate_hand(&cards).unwrap();
//! assert_eq!(strength.category, Category::RoyalFlush);
//! ```
//!
//! ## Playing a Hand
//!
//! A [`game::Table`] drives hands against its collaborators:
//!
//! ```rust
//! use holdem_engine::config::TableConfig;
//! use holdem_engine::events::EventLog;
//! use holdem_engine::game::Table;
//! use holdem_engine::ledger::InMemoryLedger;
//! use holdem_engine::logger::MemoryCheckpoints;
//! use holdem_engine::player::{PlayerAction, TableSeat};
//!
//! let events = EventLog::new();
//! let mut table = Table::new(
//!     TableConfig::with_blinds(5, 10).with_seed(42),
//!     Box::new(events.clone()),
//!     Box::new(MemoryCheckpoints::new()),
//!     Box::new(InMemoryLedger::with_balances([(0, 500), (1, 500)])),
//! )
//! .unwrap();
//! table.seat_player(TableSeat::new(0, 500)).unwrap();
//! table.seat_player(TableSeat::new(1, 500)).unwrap();
//!
//! let hand_id = table.start_hand().unwrap();
//! let state = table.hand_state(&hand_id).unwrap();
//! let seat = state.to_act.unwrap();
//! table.apply_action(&hand_id, seat, PlayerAction::Fold).unwrap();
//! assert!(table.hand_state(&hand_id).unwrap().result.is_some());
//! ```

pub mod betting;
pub mod cards;
pub mod config;
pub mod deck;
pub mod engine;
pub mod errors;
pub mod events;
pub mod game;
pub mod hand;
pub mod ledger;
pub mod logger;
pub mod player;
pub mod pot;
pub mod rules;
