use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::cards::{full_deck, Card};
use crate::errors::EngineError;

/// A single hand's deck: shuffled once, then drawn from the front.
///
/// Cards are never returned or reshuffled, so no card can be dealt twice
/// within the hand that owns this deck. The order and read position are
/// serialisable, which lets a checkpointed hand resume with the same
/// future cards.
///
/// # Examples
///
/// ```
/// use holdem_engine::deck::Deck;
///
/// let mut deck = Deck::new_with_seed(42);
/// let hole = deck.draw(2).unwrap();
/// assert_eq!(hole.len(), 2);
/// assert_eq!(deck.remaining(), 50);
///
/// // Same seed produces same order
/// let mut again = Deck::new_with_seed(42);
/// assert_eq!(again.draw(2).unwrap(), hole);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
    position: usize,
    /// Seed used for the shuffle, if it came from one
    seed: Option<u64>,
}

impl Deck {
    /// Fisher-Yates shuffle of the 52 cards driven by a seeded ChaCha20 stream.
    pub fn new_with_seed(seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut cards = full_deck();
        cards.shuffle(&mut rng);
        Self {
            cards,
            position: 0,
            seed: Some(seed),
        }
    }

    /// Shuffles with a fresh seed drawn from the thread RNG.
    pub fn shuffled() -> Self {
        Self::new_with_seed(rand::random::<u64>())
    }

    /// Deck that deals `cards` in the given order, for scripted hands.
    pub fn stacked(cards: Vec<Card>) -> Self {
        Self {
            cards,
            position: 0,
            seed: None,
        }
    }

    /// Removes and returns the next `n` cards.
    ///
    /// Fails without consuming anything when fewer than `n` cards remain.
    pub fn draw(&mut self, n: usize) -> Result<Vec<Card>, EngineError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(EngineError::DeckExhausted {
                requested: n,
                remaining,
            });
        }
        let out = self.cards[self.position..self.position + n].to_vec();
        self.position += n;
        Ok(out)
    }

    pub fn deal_card(&mut self) -> Result<Card, EngineError> {
        Ok(self.draw(1)?[0])
    }

    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.position)
    }

    /// Cards handed out so far, in deal order.
    pub fn dealt(&self) -> &[Card] {
        &self.cards[..self.position]
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_past_end_fails_without_consuming() {
        let mut deck = Deck::new_with_seed(3);
        deck.draw(50).unwrap();
        let err = deck.draw(3).unwrap_err();
        assert_eq!(
            err,
            EngineError::DeckExhausted {
                requested: 3,
                remaining: 2
            }
        );
        assert_eq!(deck.remaining(), 2);
        assert_eq!(deck.draw(2).unwrap().len(), 2);
        assert!(deck.deal_card().is_err());
    }

    #[test]
    fn stacked_deck_deals_in_order() {
        let cards: Vec<Card> = ["As", "Kd", "2c"].iter().map(|c| c.parse().unwrap()).collect();
        let mut deck = Deck::stacked(cards.clone());
        assert_eq!(deck.deal_card().unwrap(), cards[0]);
        assert_eq!(deck.draw(2).unwrap(), cards[1..].to_vec());
        assert_eq!(deck.dealt(), &cards[..]);
        assert_eq!(deck.seed(), None);
    }
}
