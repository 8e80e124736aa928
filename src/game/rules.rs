//! Movement Rules
//!
//! The piece-legality capability the game consults before applying a move.
//! Per-piece geometry lives behind this trait; the server ships
//! [`BasicRules`], which only checks that a move starts where the piece is.

use crate::core::seat::Color;
use crate::game::piece::{MoveRequest, Piece};

/// Decides whether a piece may make a requested move.
pub trait MovementRules: Send + Sync {
    /// Return true if `piece`, played by `color`, may move as requested.
    fn can_move_like_that(&self, piece: &Piece, color: Color, request: &MoveRequest) -> bool;
}

impl<F> MovementRules for F
where
    F: Fn(&Piece, Color, &MoveRequest) -> bool + Send + Sync,
{
    fn can_move_like_that(&self, piece: &Piece, color: Color, request: &MoveRequest) -> bool {
        self(piece, color, request)
    }
}

/// Accepts any move whose source matches the piece and whose color matches the mover.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicRules;

impl MovementRules for BasicRules {
    fn can_move_like_that(&self, piece: &Piece, color: Color, request: &MoveRequest) -> bool {
        piece.color == color && request.starts_at(piece.location)
    }
}
