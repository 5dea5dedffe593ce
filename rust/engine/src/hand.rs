use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::cards::{Card, Rank, Suit};
use crate::errors::EngineError;

/// Hand categories, weakest first. The derived ordering is the ranking order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    HighCard = 0,
    Pair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
    RoyalFlush = 9,
}

/// Strength of the best five-card hand found in a set of cards.
///
/// Comparing two `HandRank`s alone decides a showdown: category first, then
/// the tiebreak ranks in `kickers` (high to low, zero padded). Straights
/// carry only their top card, with the wheel (A-2-3-4-5) counted as five high.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct HandRank {
    pub category: Category,
    pub kickers: [u8; 5],
}

impl HandRank {
    /// Human-readable label, e.g. "Full House, Kings over Twos".
    pub fn describe(&self) -> String {
        let r = |i: usize| Rank::from_u8(self.kickers[i]).unwrap_or(Rank::Two);
        match self.category {
            Category::RoyalFlush => "Royal Flush".to_string(),
            Category::StraightFlush => format!("Straight Flush, {} high", r(0).name()),
            Category::FourOfAKind => format!("Four of a Kind, {}", r(0).plural()),
            Category::FullHouse => {
                format!("Full House, {} over {}", r(0).plural(), r(1).plural())
            }
            Category::Flush => format!("Flush, {} high", r(0).name()),
            Category::Straight => format!("Straight, {} high", r(0).name()),
            Category::ThreeOfAKind => format!("Three of a Kind, {}", r(0).plural()),
            Category::TwoPair => format!("Two Pair, {} and {}", r(0).plural(), r(1).plural()),
            Category::Pair => format!("Pair of {}", r(0).plural()),
            Category::HighCard => format!("High Card, {}", r(0).name()),
        }
    }
}

/// Evaluates the best five-card hand among 5 to 7 cards.
///
/// Runs a direct detector over the whole card set, so a straight or flush
/// made entirely from community cards is found the same way as one using
/// hole cards.
///
/// # Errors
///
/// [`EngineError::InsufficientCards`] when fewer than 5 or more than 7 cards
/// are given.
///
/// # Examples
///
/// ```
/// use holdem_engine::cards::Card;
/// use holdem_engine::hand::{evaluate_hand, Category};
///
/// let cards: Vec<Card> = ["As", "Ah", "Ad", "2c", "3h", "4s", "5d"]
///     .iter()
///     .map(|c| c.parse().unwrap())
///     .collect();
/// let rank = evaluate_hand(&cards).unwrap();
/// assert_eq!(rank.category, Category::Straight);
/// assert_eq!(rank.describe(), "Straight, Five high");
/// ```
pub fn evaluate_hand(cards: &[Card]) -> Result<HandRank, EngineError> {
    if !(5..=7).contains(&cards.len()) {
        return Err(EngineError::InsufficientCards { count: cards.len() });
    }

    let mut rank_counts = [0u8; 15]; // 2..14 used
    let mut rank_mask: u16 = 0;
    let mut suit_counts = [0u8; 4];
    let mut by_suit_mask = [0u16; 4];
    for &c in cards {
        let r = c.rank.value();
        rank_counts[r as usize] += 1;
        rank_mask |= 1 << r;
        let s = suit_index(c.suit);
        suit_counts[s] += 1;
        by_suit_mask[s] |= 1 << r;
    }

    let flush_suit = suit_counts.iter().position(|&n| n >= 5);

    if let Some(s) = flush_suit {
        if let Some(high) = straight_high_from_mask(by_suit_mask[s]) {
            let category = if high == 14 {
                Category::RoyalFlush
            } else {
                Category::StraightFlush
            };
            return Ok(HandRank {
                category,
                kickers: [high, 0, 0, 0, 0],
            });
        }
    }

    // Ranks grouped by multiplicity, each list high -> low.
    let mut quads = Vec::new();
    let mut trips = Vec::new();
    let mut pairs = Vec::new();
    let mut singles = Vec::new();
    for r in (2..=14u8).rev() {
        match rank_counts[r as usize] {
            4 => quads.push(r),
            3 => trips.push(r),
            2 => pairs.push(r),
            1 => singles.push(r),
            _ => {}
        }
    }

    if let Some(&quad) = quads.first() {
        let kicker = highest_excluding(&rank_counts, &[quad], 1);
        return Ok(HandRank {
            category: Category::FourOfAKind,
            kickers: [quad, kicker[0], 0, 0, 0],
        });
    }

    if let Some(&trip) = trips.first() {
        // Best pair may come from a second set of trips.
        let pair = trips.get(1).copied().into_iter().chain(pairs.first().copied()).max();
        if let Some(pair) = pair {
            return Ok(HandRank {
                category: Category::FullHouse,
                kickers: [trip, pair, 0, 0, 0],
            });
        }
    }

    if let Some(s) = flush_suit {
        let top = top_ranks_from_mask(by_suit_mask[s], 5);
        let mut k = [0u8; 5];
        k.copy_from_slice(&top);
        return Ok(HandRank {
            category: Category::Flush,
            kickers: k,
        });
    }

    if let Some(high) = straight_high_from_mask(rank_mask) {
        return Ok(HandRank {
            category: Category::Straight,
            kickers: [high, 0, 0, 0, 0],
        });
    }

    if let Some(&trip) = trips.first() {
        let rest = highest_excluding(&rank_counts, &[trip], 2);
        return Ok(HandRank {
            category: Category::ThreeOfAKind,
            kickers: [trip, rest[0], rest[1], 0, 0],
        });
    }

    if pairs.len() >= 2 {
        let (high, low) = (pairs[0], pairs[1]);
        // A third pair's rank still competes for the kicker slot.
        let rest = highest_excluding(&rank_counts, &[high, low], 1);
        return Ok(HandRank {
            category: Category::TwoPair,
            kickers: [high, low, rest[0], 0, 0],
        });
    }

    if let Some(&pair) = pairs.first() {
        let rest = highest_excluding(&rank_counts, &[pair], 3);
        return Ok(HandRank {
            category: Category::Pair,
            kickers: [pair, rest[0], rest[1], rest[2], 0],
        });
    }

    let mut k = [0u8; 5];
    for (slot, r) in k.iter_mut().zip(singles) {
        *slot = r;
    }
    Ok(HandRank {
        category: Category::HighCard,
        kickers: k,
    })
}

pub fn compare_hands(a: &HandRank, b: &HandRank) -> Ordering {
    a.cmp(b)
}

/// Picks the five cards that make up the best hand, alongside its rank.
///
/// Checks every five-card subset (at most 21 for seven cards) and returns the
/// first one that scores as well as the full set.
pub fn best_five(cards: &[Card]) -> Result<(HandRank, Vec<Card>), EngineError> {
    let best = evaluate_hand(cards)?;
    let n = cards.len();
    for a in 0..n {
        for b in a + 1..n {
            for c in b + 1..n {
                for d in c + 1..n {
                    for e in d + 1..n {
                        let five = [cards[a], cards[b], cards[c], cards[d], cards[e]];
                        if evaluate_hand(&five)? == best {
                            return Ok((best, five.to_vec()));
                        }
                    }
                }
            }
        }
    }
    // Unreachable: the best hand is always one of the subsets.
    Err(EngineError::InsufficientCards { count: n })
}

fn suit_index(s: Suit) -> usize {
    match s {
        Suit::Clubs => 0,
        Suit::Diamonds => 1,
        Suit::Hearts => 2,
        Suit::Spades => 3,
    }
}

fn straight_high_from_mask(mask: u16) -> Option<u8> {
    // Ace also plays low, as bit 1, for the wheel only
    let mut m = mask;
    if (m & (1 << 14)) != 0 {
        m |= 1 << 1;
    }
    // Sliding 5-bit window from Ace(14) down to 5
    for high in (5..=14u8).rev() {
        let window = 0b1_1111u16 << (high - 4);
        if (m & window) == window {
            return Some(high);
        }
    }
    None
}

fn top_ranks_from_mask(mask: u16, n: usize) -> Vec<u8> {
    (2..=14u8)
        .rev()
        .filter(|r| mask & (1 << r) != 0)
        .take(n)
        .collect()
}

/// Highest `n` distinct ranks present, skipping `excluded`, zero padded.
fn highest_excluding(rank_counts: &[u8; 15], excluded: &[u8], n: usize) -> Vec<u8> {
    let mut out: Vec<u8> = (2..=14u8)
        .rev()
        .filter(|r| rank_counts[*r as usize] > 0 && !excluded.contains(r))
        .take(n)
        .collect();
    out.resize(n, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(s: &str) -> Vec<Card> {
        s.split_whitespace().map(|c| c.parse().unwrap()).collect()
    }

    #[test]
    fn rejects_too_few_and_too_many_cards() {
        assert_eq!(
            evaluate_hand(&cards("As Ks Qs Js")),
            Err(EngineError::InsufficientCards { count: 4 })
        );
        assert!(evaluate_hand(&cards("As Ks Qs Js Ts 9s 8s 7s")).is_err());
    }

    #[test]
    fn two_trips_make_full_house_with_higher_trip_on_top() {
        let rank = evaluate_hand(&cards("9c 9d 9h 4s 4c 4d Kh")).unwrap();
        assert_eq!(rank.category, Category::FullHouse);
        assert_eq!(rank.kickers[..2], [9, 4]);
    }

    #[test]
    fn third_pair_can_be_two_pair_kicker() {
        let rank = evaluate_hand(&cards("Qc Qd 8h 8s 6c 6d 2h")).unwrap();
        assert_eq!(rank.category, Category::TwoPair);
        assert_eq!(rank.kickers[..3], [12, 8, 6]);
    }

    #[test]
    fn best_five_returns_the_scoring_cards() {
        let (rank, five) = best_five(&cards("2h 7h Jh Qh 9h Ac Kd")).unwrap();
        assert_eq!(rank.category, Category::Flush);
        assert_eq!(five.len(), 5);
        assert!(five.iter().all(|c| c.suit == Suit::Hearts));
    }

    #[test]
    fn describes_hands() {
        let fh = evaluate_hand(&cards("Kc Kd Kh 2s 2c")).unwrap();
        assert_eq!(fh.describe(), "Full House, Kings over Twos");
        let royal = evaluate_hand(&cards("Th Jh Qh Kh Ah")).unwrap();
        assert_eq!(royal.describe(), "Royal Flush");
    }
}
