use holdem_engine::hand::{Category, HandRank};
use holdem_engine::pot::{PotEntry, PotManager};

fn pair_of(rank: u8) -> Option<HandRank> {
    Some(HandRank {
        category: Category::Pair,
        kickers: [rank, 0, 0, 0, 0],
    })
}

#[test]
fn heads_up_simple_side_pot() {
    let pm = PotManager::from_contributions([500, 1000]);
    assert_eq!(pm.main_pot(), 1000);
    assert_eq!(pm.side_pots(), vec![500]);
}

#[test]
fn equal_stacks_no_side_pot() {
    let pm = PotManager::from_contributions([1000, 1000]);
    assert_eq!(pm.main_pot(), 2000);
    assert!(pm.side_pots().is_empty());
}

#[test]
fn short_all_in_gets_main_pot_and_others_fight_for_side_pot() {
    let entries = [
        PotEntry::contesting(0, 100, pair_of(14)),
        PotEntry::contesting(1, 300, pair_of(13)),
        PotEntry::contesting(2, 300, pair_of(12)),
    ];
    let pm = PotManager::from_entries(&entries);
    assert_eq!(pm.main_pot(), 300);
    assert_eq!(pm.side_pots(), vec![400]);
    assert_eq!(pm.layers()[0].eligible, vec![0, 1, 2]);
    assert_eq!(pm.layers()[1].eligible, vec![1, 2]);

    let dist = pm.distribute(&entries, 0).unwrap();
    assert_eq!(dist.payout(0), 300);
    assert_eq!(dist.payout(1), 400);
    assert_eq!(dist.payout(2), 0);
    assert_eq!(dist.total(), 700);
}

#[test]
fn three_levels_make_two_side_pots() {
    let pm = PotManager::from_contributions([50, 200, 500, 500]);
    assert_eq!(pm.main_pot(), 200);
    assert_eq!(pm.side_pots(), vec![450, 600]);
    assert_eq!(pm.total(), 1250);
}

#[test]
fn odd_chip_goes_to_first_winner_left_of_button() {
    let entries = [
        PotEntry::contesting(0, 50, pair_of(9)),
        PotEntry::contesting(1, 50, pair_of(9)),
        PotEntry::folded(2, 1),
    ];
    let dist = PotManager::from_entries(&entries)
        .distribute(&entries, 0)
        .unwrap();
    // 101 chips split two ways; seat 1 sits left of the button.
    assert_eq!(dist.payout(1), 51);
    assert_eq!(dist.payout(0), 50);
    assert_eq!(dist.total(), 101);
}

#[test]
fn odd_chip_wraps_around_the_table() {
    let entries = [
        PotEntry::contesting(2, 50, pair_of(9)),
        PotEntry::contesting(5, 50, pair_of(9)),
        PotEntry::folded(7, 1),
    ];
    let dist = PotManager::from_entries(&entries)
        .distribute(&entries, 5)
        .unwrap();
    assert_eq!(dist.payout(2), 51);
    assert_eq!(dist.payout(5), 50);
}

#[test]
fn split_side_pot_and_separate_main_winner() {
    let entries = [
        PotEntry::contesting(0, 100, pair_of(14)),
        PotEntry::contesting(1, 301, pair_of(10)),
        PotEntry::contesting(2, 301, pair_of(10)),
        PotEntry::folded(3, 300),
    ];
    let pm = PotManager::from_entries(&entries);
    // Main: 4 x 100. Side: 3 x 200 plus 1 + 1 above the folded seat.
    assert_eq!(pm.main_pot(), 400);
    assert_eq!(pm.total(), 1002);
    let dist = pm.distribute(&entries, 3).unwrap();
    assert_eq!(dist.payout(0), 400);
    assert_eq!(dist.payout(1) + dist.payout(2), 602);
    assert_eq!(dist.payout(1), 301);
    assert_eq!(dist.payout(3), 0);
}
