//! Core primitives.
//!
//! Identifiers and seat geometry shared by the game and network layers.

pub mod ids;
pub mod seat;

// Re-export core types
pub use ids::{GameId, ProfileId, PieceId, ClientId};
pub use seat::{Seat, BoardIndex, Color, SeatLayout, MAX_SUPPORTED_BOARDS};
