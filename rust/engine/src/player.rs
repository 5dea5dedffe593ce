use serde::{Deserialize, Serialize};

use crate::cards::Card;

/// Seat index at the table. Clockwise order is increasing seat id, wrapping.
pub type SeatId = u8;

/// Table position, derived from a seat's clockwise distance from the button.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "SB")]
    SmallBlind,
    #[serde(rename = "BB")]
    BigBlind,
    #[serde(rename = "UTG")]
    UnderTheGun,
    #[serde(rename = "MP")]
    Middle,
    #[serde(rename = "CO")]
    Cutoff,
    #[serde(rename = "BTN")]
    Button,
}

impl Position {
    /// Position of the seat `distance` places clockwise from the button
    /// among `players` seats dealt in.
    ///
    /// Heads-up the button is also the small blind. Three or more: button,
    /// small blind, big blind, then under the gun; the seat right of the
    /// button is the cutoff once there are at least two seats after the
    /// blinds, and everything between is middle position.
    pub fn from_button_distance(distance: usize, players: usize) -> Position {
        if players <= 2 {
            return if distance == 0 {
                Position::SmallBlind
            } else {
                Position::BigBlind
            };
        }
        match distance {
            0 => Position::Button,
            1 => Position::SmallBlind,
            2 => Position::BigBlind,
            d => {
                let k = d - 3;
                let after_blinds = players - 3;
                if k == 0 {
                    Position::UnderTheGun
                } else if k == after_blinds - 1 {
                    Position::Cutoff
                } else {
                    Position::Middle
                }
            }
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Active,
    Folded,
    AllIn,
    SittingOut,
}

/// A betting action submitted by (or forced on) a seat.
///
/// `Raise` carries the seat's new total contribution for the current
/// betting round ("raise to"), not the increment.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "to", rename_all = "snake_case")]
pub enum PlayerAction {
    Fold,
    Check,
    Call,
    Raise(u32),
    AllIn,
}

/// A seat as the table hands it to a new hand: who sits there and how many
/// chips the bankroll holds for them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TableSeat {
    pub seat_id: SeatId,
    pub stack: u32,
    #[serde(default)]
    pub sitting_out: bool,
}

impl TableSeat {
    pub fn new(seat_id: SeatId, stack: u32) -> Self {
        Self {
            seat_id,
            stack,
            sitting_out: false,
        }
    }

    pub fn can_play(&self) -> bool {
        self.stack > 0 && !self.sitting_out
    }
}

/// Per-hand state of one seat.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub seat_id: SeatId,
    pub hole_cards: Option<[Card; 2]>,
    /// Chips committed this hand across all streets
    pub chips_in_pot: u32,
    pub chips_remaining: u32,
    pub status: SeatStatus,
    pub position: Option<Position>,
}

impl Seat {
    pub fn new(seat: &TableSeat) -> Self {
        let status = if seat.can_play() {
            SeatStatus::Active
        } else {
            SeatStatus::SittingOut
        };
        Self {
            seat_id: seat.seat_id,
            hole_cards: None,
            chips_in_pot: 0,
            chips_remaining: seat.stack,
            status,
            position: None,
        }
    }

    /// Still contesting the pot (active or all-in).
    pub fn in_hand(&self) -> bool {
        matches!(self.status, SeatStatus::Active | SeatStatus::AllIn)
    }

    pub fn can_act(&self) -> bool {
        self.status == SeatStatus::Active
    }

    /// Moves up to `amount` from the stack into the pot and returns what was
    /// actually committed. Emptying the stack puts the seat all-in.
    pub fn commit(&mut self, amount: u32) -> u32 {
        let paid = amount.min(self.chips_remaining);
        self.chips_remaining -= paid;
        self.chips_in_pot += paid;
        if self.chips_remaining == 0 && self.status == SeatStatus::Active {
            self.status = SeatStatus::AllIn;
        }
        paid
    }

    /// Chips this seat brought into the hand.
    pub fn starting_stack(&self) -> u64 {
        self.chips_in_pot as u64 + self.chips_remaining as u64
    }
}
