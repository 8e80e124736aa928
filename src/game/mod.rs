//! Game Logic Module
//!
//! Synchronous game rules. Nothing here spawns tasks or does I/O.
//!
//! ## Module Structure
//!
//! - `piece`: Pieces, locations and move requests
//! - `rules`: Movement legality capability
//! - `player`: Profiles and seated players
//! - `state`: Seats, turns, ownership and the move pipeline

pub mod piece;
pub mod rules;
pub mod player;
pub mod state;

// Re-export key types
pub use piece::{MoveRequest, Piece, PieceKind, PieceLocation};
pub use rules::{BasicRules, MovementRules};
pub use player::{Player, Profile};
pub use state::{GameError, GameSettings, GameState, MoveOutcome, MoveRejection, Removal};
