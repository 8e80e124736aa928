//! Seat Geometry
//!
//! Maps seat numbers to color and board, and encodes the turn rotation
//! as an explicit table keyed by board count.
//!
//! With two boards the layout is:
//!
//! ```text
//!   board 1: seat 1 (White) vs seat 3 (Black)
//!   board 2: seat 2 (White) vs seat 4 (Black)
//! ```

use serde::{Serialize, Deserialize};

/// Seat number, 1-based.
pub type Seat = u8;

/// Board number, 1-based.
pub type BoardIndex = u8;

/// Only supported board count.
pub const MAX_SUPPORTED_BOARDS: u8 = 2;

/// Turn partner for each seat (index `seat - 1`) in the two-board layout.
const TWO_BOARD_ROTATION: [Seat; 4] = [3, 4, 1, 2];

/// Piece color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    /// Moves first on its board.
    White,
    /// Moves second on its board.
    Black,
}

impl Color {
    /// Back rank (y coordinate) for this color.
    pub fn home_rank(self) -> u8 {
        match self {
            Color::White => 1,
            Color::Black => 8,
        }
    }

    /// Pawn rank (y coordinate) for this color.
    pub fn pawn_rank(self) -> u8 {
        match self {
            Color::White => 2,
            Color::Black => 7,
        }
    }
}

/// Seat layout for a given board count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeatLayout {
    boards: u8,
    rotation: &'static [Seat],
}

impl SeatLayout {
    /// Layout for `boards` boards, or `None` if that count is unsupported.
    pub fn for_boards(boards: u8) -> Option<Self> {
        match boards {
            MAX_SUPPORTED_BOARDS => Some(Self {
                boards,
                rotation: &TWO_BOARD_ROTATION,
            }),
            _ => None,
        }
    }

    /// Number of boards.
    pub fn boards(&self) -> u8 {
        self.boards
    }

    /// Seat capacity (`boards * 2`).
    pub fn max_players(&self) -> u8 {
        self.boards * 2
    }

    /// Whether `seat` is in `1..=max_players`.
    pub fn is_valid_seat(&self, seat: Seat) -> bool {
        (1..=self.max_players()).contains(&seat)
    }

    /// All seats in ascending order.
    pub fn seats(&self) -> impl Iterator<Item = Seat> {
        1..=self.max_players()
    }

    /// Color played from `seat`.
    pub fn color_for(&self, seat: Seat) -> Color {
        if seat <= self.boards {
            Color::White
        } else {
            Color::Black
        }
    }

    /// Board played from `seat`.
    pub fn board_for(&self, seat: Seat) -> BoardIndex {
        (seat.saturating_sub(1) % self.boards) + 1
    }

    /// Seat that receives the turn after `seat` moves.
    pub fn partner_of(&self, seat: Seat) -> Option<Seat> {
        if !self.is_valid_seat(seat) {
            return None;
        }
        self.rotation.get(usize::from(seat) - 1).copied()
    }
}
