//! Pieces and Move Requests
//!
//! A piece is either on a board at coordinates or in the off-board cache.
//! Its owner is fixed at creation; only its location ever changes.

use serde::{Serialize, Deserialize};

use crate::core::ids::{PieceId, ProfileId};
use crate::core::seat::{BoardIndex, Color};

/// Board edge length.
pub const BOARD_SIZE: u8 = 8;

/// Back rank order from x = 1 to x = 8.
const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

/// Piece type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceKind {
    /// King
    King,
    /// Queen
    Queen,
    /// Rook
    Rook,
    /// Bishop
    Bishop,
    /// Knight
    Knight,
    /// Pawn
    Pawn,
}

/// Where a piece currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum PieceLocation {
    /// On a board at 1-based coordinates.
    Board {
        /// Board number.
        board: BoardIndex,
        /// File, 1..=8.
        x: u8,
        /// Rank, 1..=8.
        y: u8,
    },
    /// Off-board holding area.
    Cache,
}

impl PieceLocation {
    /// Whether this location exists in a game with `boards` boards.
    pub fn is_valid(&self, boards: u8) -> bool {
        match *self {
            PieceLocation::Board { board, x, y } => {
                (1..=boards).contains(&board)
                    && (1..=BOARD_SIZE).contains(&x)
                    && (1..=BOARD_SIZE).contains(&y)
            }
            PieceLocation::Cache => true,
        }
    }
}

/// A move as submitted by a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Piece to move.
    pub piece_id: PieceId,
    /// Source file.
    pub from_x: u8,
    /// Source rank.
    pub from_y: u8,
    /// Target file.
    pub to_x: u8,
    /// Target rank.
    pub to_y: u8,
    /// Board the move happens on.
    pub board: BoardIndex,
    /// True when the piece goes to (or comes from) the cache.
    #[serde(default)]
    pub cache: bool,
}

impl MoveRequest {
    /// Location the client asked for, without any validation.
    pub fn requested_location(&self) -> PieceLocation {
        if self.cache {
            PieceLocation::Cache
        } else {
            PieceLocation::Board {
                board: self.board,
                x: self.to_x,
                y: self.to_y,
            }
        }
    }

    /// Validated target location.
    ///
    /// The cache is only a valid target with zeroed target coordinates;
    /// a board target must lie on an existing board.
    pub fn target(&self, boards: u8) -> Option<PieceLocation> {
        if self.cache {
            return (self.to_x == 0 && self.to_y == 0).then_some(PieceLocation::Cache);
        }
        let target = self.requested_location();
        target.is_valid(boards).then_some(target)
    }

    /// Whether the source coordinates describe `location`.
    pub fn starts_at(&self, location: PieceLocation) -> bool {
        match location {
            PieceLocation::Board { board, x, y } => {
                self.board == board && self.from_x == x && self.from_y == y
            }
            PieceLocation::Cache => self.from_x == 0 && self.from_y == 0,
        }
    }
}

/// A single piece.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    /// Unique id.
    pub id: PieceId,
    /// Piece type.
    pub kind: PieceKind,
    /// Piece color.
    pub color: Color,
    /// Owning profile.
    pub owner: ProfileId,
    /// Current location.
    pub location: PieceLocation,
}

impl Piece {
    /// Create a piece on a board square.
    pub fn new(
        id: PieceId,
        kind: PieceKind,
        color: Color,
        owner: ProfileId,
        location: PieceLocation,
    ) -> Self {
        Self { id, kind, color, owner, location }
    }

    /// Move the piece. Legality is decided before this is called.
    pub fn apply(&mut self, target: PieceLocation) {
        self.location = target;
    }

    /// The 16 starting pieces for one side of a board.
    pub fn starting_set(owner: &ProfileId, color: Color, board: BoardIndex) -> Vec<Piece> {
        let mut pieces = Vec::with_capacity(16);

        for (i, kind) in BACK_RANK.iter().enumerate() {
            pieces.push(Piece::new(
                PieceId::generate(),
                *kind,
                color,
                owner.clone(),
                PieceLocation::Board { board, x: i as u8 + 1, y: color.home_rank() },
            ));
        }

        for x in 1..=BOARD_SIZE {
            pieces.push(Piece::new(
                PieceId::generate(),
                PieceKind::Pawn,
                color,
                owner.clone(),
                PieceLocation::Board { board, x, y: color.pawn_rank() },
            ));
        }

        pieces
    }
}
