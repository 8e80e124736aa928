//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Messages are JSON text frames; moves may also arrive as
//! bincode binary frames.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::ids::{GameId, ProfileId};
use crate::core::seat::{BoardIndex, Color, Seat};
use crate::game::piece::{MoveRequest, Piece};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Set the display name used in game titles and snapshots.
    SetNick { nick: String },

    /// Create a new game and take seat 1.
    CreateGame,

    /// Request the list of open games.
    ListGames,

    /// Join an existing game.
    JoinGame { game_id: GameId },

    /// Start the current game (owner only).
    StartGame,

    /// Move a piece.
    Move(MoveRequest),

    /// Move to another seat.
    ChangeSeat { seat: Seat },

    /// Leave the current game.
    LeaveGame,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after connecting.
    Welcome(WelcomeInfo),

    /// Open games.
    GameList { games: Vec<GameSummary> },

    /// Full game state after a command.
    State(GameSnapshot),

    /// Error message.
    Error(ServerError),

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Identity handed to a new connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeInfo {
    /// Public profile id.
    pub profile_id: ProfileId,
    /// Private secret for this profile.
    pub secret: String,
    /// Server version.
    pub server_version: String,
}

/// Entry in the game list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    /// Game identifier.
    pub id: GameId,
    /// Display title.
    pub title: String,
}

/// State snapshot broadcast to every seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Game identifier.
    pub id: GameId,
    /// Whether the game has started.
    pub started: bool,
    /// Display title.
    pub title: String,
    /// Owner profile (None once everyone left).
    pub owner: Option<ProfileId>,
    /// Seated players keyed by seat number (decimal string, as JSON object keys are).
    pub seats: BTreeMap<String, PlayerSnapshot>,
    /// Number of boards.
    pub boards: u8,
    /// Whether the owner may start before every seat is filled.
    pub can_start_before_full: bool,
    /// Number of commands the game has processed.
    pub revision: u64,
}

/// Player in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Display name.
    pub nick: String,
    /// Public profile id.
    pub id: ProfileId,
    /// Seat number.
    pub seat: Seat,
    /// Color played.
    pub color: Color,
    /// Board played.
    pub board: BoardIndex,
    /// Whether this player is to move.
    pub my_turn: bool,
    /// Owned pieces.
    pub pieces: Vec<Piece>,
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Short headline, e.g. "Failed to start game".
    pub title: String,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Build an error payload.
    pub fn new(code: ErrorCode, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed message.
    InvalidInput,
    /// Game id unknown.
    GameNotFound,
    /// Client is not in a game.
    NotInGame,
    /// Client is already in a game.
    AlreadyInGame,
    /// No free seat.
    GameFull,
    /// Game already started.
    GameStarted,
    /// Start refused for lack of players.
    NotEnoughPlayers,
    /// Only the owner may do this.
    NotOwner,
    /// Seat occupied.
    SeatTaken,
    /// Seat number out of range.
    InvalidSeat,
    /// Move refused.
    InvalidMove,
    /// Game is shutting down or overloaded.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl MoveRequest {
    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
