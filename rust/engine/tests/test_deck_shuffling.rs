use std::collections::HashSet;

use holdem_engine::cards::Card;
use holdem_engine::deck::Deck;
use holdem_engine::errors::EngineError;

#[test]
fn seeded_deck_deals_52_unique_cards() {
    let mut deck = Deck::new_with_seed(42);
    let mut set = HashSet::new();
    for i in 0..52 {
        let c = deck.deal_card().expect("should have 52 cards");
        assert!(set.insert(c), "card {} duplicated at position {}", c, i);
    }
    assert_eq!(
        deck.deal_card(),
        Err(EngineError::DeckExhausted {
            requested: 1,
            remaining: 0
        })
    );
}

#[test]
fn shuffle_is_deterministic_with_same_seed() {
    let mut d1 = Deck::new_with_seed(12345);
    let mut d2 = Deck::new_with_seed(12345);
    let a: Vec<Card> = d1.draw(10).unwrap();
    let b: Vec<Card> = d2.draw(10).unwrap();
    assert_eq!(a, b, "same seed must yield identical order");
}

#[test]
fn shuffle_differs_with_different_seed() {
    let mut d1 = Deck::new_with_seed(1);
    let mut d2 = Deck::new_with_seed(2);
    assert_ne!(d1.draw(52).unwrap(), d2.draw(52).unwrap());
}

#[test]
fn failed_draw_consumes_nothing() {
    let mut deck = Deck::new_with_seed(9);
    deck.draw(50).unwrap();
    assert!(deck.draw(3).is_err());
    assert_eq!(deck.remaining(), 2);
    assert_eq!(deck.draw(2).unwrap().len(), 2);
}

#[test]
fn dealt_cards_are_tracked_in_order() {
    let mut deck = Deck::new_with_seed(3);
    let first = deck.draw(2).unwrap();
    let next = deck.deal_card().unwrap();
    assert_eq!(deck.dealt(), &[first[0], first[1], next]);
    assert_eq!(deck.seed(), Some(3));
}

#[test]
fn unseeded_decks_are_still_complete() {
    let mut deck = Deck::shuffled();
    let cards: HashSet<Card> = deck.draw(52).unwrap().into_iter().collect();
    assert_eq!(cards.len(), 52);
}
