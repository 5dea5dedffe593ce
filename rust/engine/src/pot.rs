//! Side-pot resolution.
//!
//! Contributions are cut into layers at every distinct contribution level of
//! the seats still contesting the hand. Folded chips fill the layers they
//! reach but never make the folded seat eligible to win.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::hand::HandRank;
use crate::player::SeatId;

/// One seat's stake in the final pot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PotEntry {
    pub seat_id: SeatId,
    /// Total chips committed over the whole hand
    pub contribution: u32,
    pub folded: bool,
    /// Showdown strength; `None` for a seat that won uncontested
    pub hand: Option<HandRank>,
}

impl PotEntry {
    pub fn folded(seat_id: SeatId, contribution: u32) -> Self {
        Self {
            seat_id,
            contribution,
            folded: true,
            hand: None,
        }
    }

    pub fn contesting(seat_id: SeatId, contribution: u32, hand: Option<HandRank>) -> Self {
        Self {
            seat_id,
            contribution,
            folded: false,
            hand,
        }
    }
}

/// A main or side pot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotLayer {
    /// Contribution a seat needs to be eligible
    pub level: u32,
    pub amount: u64,
    pub eligible: Vec<SeatId>,
}

/// A pot layer after it has been awarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotAward {
    pub level: u32,
    pub amount: u64,
    pub eligible: Vec<SeatId>,
    /// Winners in clockwise order from the button
    pub winners: Vec<SeatId>,
    pub shares: Vec<(SeatId, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Distribution {
    pub awards: Vec<PotAward>,
    pub payouts: BTreeMap<SeatId, u64>,
}

impl Distribution {
    pub fn total(&self) -> u64 {
        self.payouts.values().sum()
    }

    pub fn payout(&self, seat: SeatId) -> u64 {
        self.payouts.get(&seat).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PotManager {
    layers: Vec<PotLayer>,
    total: u64,
}

impl PotManager {
    pub fn from_entries(entries: &[PotEntry]) -> Self {
        let total: u64 = entries.iter().map(|e| e.contribution as u64).sum();
        let contesting: Vec<&PotEntry> = entries.iter().filter(|e| !e.folded).collect();

        let mut levels: Vec<u32> = contesting
            .iter()
            .map(|e| e.contribution)
            .filter(|&c| c > 0)
            .collect();
        levels.sort_unstable();
        levels.dedup();

        let mut layers = Vec::with_capacity(levels.len());
        let mut prev = 0u32;
        for level in levels {
            let amount: u64 = entries
                .iter()
                .map(|e| (e.contribution.min(level) - e.contribution.min(prev)) as u64)
                .sum();
            let eligible = contesting
                .iter()
                .filter(|e| e.contribution >= level)
                .map(|e| e.seat_id)
                .collect();
            layers.push(PotLayer {
                level,
                amount,
                eligible,
            });
            prev = level;
        }

        if layers.is_empty() && total > 0 && !contesting.is_empty() {
            layers.push(PotLayer {
                level: 0,
                amount: 0,
                eligible: contesting.iter().map(|e| e.seat_id).collect(),
            });
        }
        // Folded chips above the top contesting level go to the top pot.
        let layered: u64 = layers.iter().map(|l| l.amount).sum();
        if let Some(top) = layers.last_mut() {
            top.amount += total - layered;
        }

        Self { layers, total }
    }

    /// Convenience for plain contributions where nobody folded.
    pub fn from_contributions<I: IntoIterator<Item = u32>>(contributions: I) -> Self {
        let entries: Vec<PotEntry> = contributions
            .into_iter()
            .enumerate()
            .map(|(i, c)| PotEntry::contesting(i as SeatId, c, None))
            .collect();
        Self::from_entries(&entries)
    }

    pub fn layers(&self) -> &[PotLayer] {
        &self.layers
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn main_pot(&self) -> u64 {
        self.layers.first().map(|l| l.amount).unwrap_or(0)
    }

    pub fn side_pots(&self) -> Vec<u64> {
        self.layers.iter().skip(1).map(|l| l.amount).collect()
    }

    /// Awards every layer to its best eligible hand(s).
    ///
    /// Ties split evenly; leftover chips go one at a time to the tied
    /// winners nearest the button going clockwise (the seat just after the
    /// button first, the button itself last).
    ///
    /// # Errors
    ///
    /// [`EngineError::ChipConservation`] when the awards do not add up to the
    /// total contributed.
    pub fn distribute(
        &self,
        entries: &[PotEntry],
        button: SeatId,
    ) -> Result<Distribution, EngineError> {
        let hand_of = |seat: SeatId| {
            entries
                .iter()
                .find(|e| e.seat_id == seat)
                .and_then(|e| e.hand)
        };

        let mut dist = Distribution::default();
        for layer in &self.layers {
            let best = layer.eligible.iter().map(|&s| hand_of(s)).max().flatten();
            let mut winners: Vec<SeatId> = layer
                .eligible
                .iter()
                .copied()
                .filter(|&s| hand_of(s) == best)
                .collect();
            winners.sort_by_key(|&s| clockwise_key(s, button));

            let count = winners.len() as u64;
            if count == 0 {
                continue;
            }
            let share = layer.amount / count;
            let odd = layer.amount % count;
            let shares: Vec<(SeatId, u64)> = winners
                .iter()
                .enumerate()
                .map(|(i, &s)| (s, share + u64::from((i as u64) < odd)))
                .collect();
            for &(seat, amount) in &shares {
                *dist.payouts.entry(seat).or_insert(0) += amount;
            }
            dist.awards.push(PotAward {
                level: layer.level,
                amount: layer.amount,
                eligible: layer.eligible.clone(),
                winners,
                shares,
            });
        }

        if dist.total() != self.total {
            return Err(EngineError::ChipConservation {
                expected: self.total,
                actual: dist.total(),
            });
        }
        Ok(dist)
    }
}

/// Sort key placing seats clockwise starting just after the button.
fn clockwise_key(seat: SeatId, button: SeatId) -> (bool, SeatId) {
    (seat <= button, seat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::{Category, HandRank};

    fn rank(category: Category, top: u8) -> Option<HandRank> {
        Some(HandRank {
            category,
            kickers: [top, 0, 0, 0, 0],
        })
    }

    #[test]
    fn folded_chips_count_toward_layers_without_eligibility() {
        let entries = [
            PotEntry::folded(0, 50),
            PotEntry::contesting(1, 100, rank(Category::Pair, 5)),
            PotEntry::contesting(2, 100, rank(Category::Pair, 9)),
        ];
        let pm = PotManager::from_entries(&entries);
        assert_eq!(pm.main_pot(), 250);
        assert!(pm.side_pots().is_empty());
        let dist = pm.distribute(&entries, 0).unwrap();
        assert_eq!(dist.payout(2), 250);
        assert_eq!(dist.payout(0), 0);
    }

    #[test]
    fn uncalled_excess_returns_to_its_owner() {
        let entries = [
            PotEntry::contesting(0, 300, rank(Category::HighCard, 9)),
            PotEntry::contesting(1, 100, rank(Category::Flush, 14)),
        ];
        let dist = PotManager::from_entries(&entries)
            .distribute(&entries, 0)
            .unwrap();
        assert_eq!(dist.payout(1), 200);
        assert_eq!(dist.payout(0), 200);
    }

    #[test]
    fn odd_chips_start_left_of_button() {
        let entries = [
            PotEntry::contesting(1, 34, rank(Category::Straight, 9)),
            PotEntry::contesting(4, 34, rank(Category::Straight, 9)),
            PotEntry::contesting(6, 34, rank(Category::Straight, 9)),
            PotEntry::folded(8, 2),
        ];
        // 104 chips, three ways: 34 each plus two odd chips.
        let dist = PotManager::from_entries(&entries)
            .distribute(&entries, 4)
            .unwrap();
        assert_eq!(dist.payout(6), 35);
        assert_eq!(dist.payout(1), 35);
        assert_eq!(dist.payout(4), 34);
        assert_eq!(dist.awards[0].winners, vec![6, 1, 4]);
    }

    #[test]
    fn lone_contesting_seat_without_hand_takes_everything() {
        let entries = [
            PotEntry::folded(0, 10),
            PotEntry::folded(1, 60),
            PotEntry::contesting(2, 20, None),
        ];
        let pm = PotManager::from_entries(&entries);
        assert_eq!(pm.total(), 90);
        let dist = pm.distribute(&entries, 0).unwrap();
        assert_eq!(dist.payout(2), 90);
    }
}
