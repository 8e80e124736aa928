//! State Broadcast
//!
//! Shapes a game into a snapshot and pushes it to every seated player.
//! Also maps game errors to the error payload sent to one client.

use tracing::debug;

use crate::game::player::Player;
use crate::game::state::{GameError, GameState};
use crate::network::client::Delivery;
use crate::network::protocol::{
    ErrorCode, GameSnapshot, PlayerSnapshot, ServerError, ServerMessage,
};

/// Error title for a refused game creation.
pub const CREATE_FAILED: &str = "Failed to create game";
/// Error title for a refused join.
pub const JOIN_FAILED: &str = "Failed to join game";
/// Error title for a refused start.
pub const START_FAILED: &str = "Failed to start game";
/// Error title for a refused seat change.
pub const SEAT_CHANGE_FAILED: &str = "Failed to move seats";
/// Error title for a refused move.
pub const MOVE_FAILED: &str = "Failed to move piece";
/// Error title for a refused leave.
pub const LEAVE_FAILED: &str = "Failed to leave game";

/// Build the snapshot for `state` at `revision`.
pub fn snapshot(state: &GameState, revision: u64) -> GameSnapshot {
    GameSnapshot {
        id: state.id().clone(),
        started: state.is_started(),
        title: state.title().to_string(),
        owner: state.owner().cloned(),
        seats: state
            .seats()
            .iter()
            .map(|(seat, player)| (seat.to_string(), player_snapshot(player)))
            .collect(),
        boards: state.layout().boards(),
        can_start_before_full: state.can_start_before_full(),
        revision,
    }
}

fn player_snapshot(player: &Player) -> PlayerSnapshot {
    PlayerSnapshot {
        nick: player.profile.nick.clone(),
        id: player.profile.id.clone(),
        seat: player.seat,
        color: player.color,
        board: player.board,
        my_turn: player.my_turn,
        pieces: player.pieces.values().cloned().collect(),
    }
}

/// Send `message` to every seated player. Returns how many accepted it.
pub fn announce(state: &GameState, message: &ServerMessage) -> usize {
    state
        .seats()
        .values()
        .filter(|player| {
            let delivery = player.profile.client.deliver(message.clone());
            if delivery != Delivery::Sent {
                debug!("Seat {} did not take broadcast: {:?}", player.seat, delivery);
            }
            delivery == Delivery::Sent
        })
        .count()
}

/// Send the current snapshot to every seated player.
pub fn broadcast(state: &GameState, revision: u64) -> usize {
    announce(state, &ServerMessage::State(snapshot(state, revision)))
}

/// Error payload for a failed command.
pub fn error_payload(title: &str, error: &GameError) -> ServerError {
    let code = match error {
        GameError::GameFull => ErrorCode::GameFull,
        GameError::GameStarted => ErrorCode::GameStarted,
        GameError::GameClosed => ErrorCode::GameNotFound,
        GameError::AlreadySeated => ErrorCode::AlreadyInGame,
        GameError::NotEnoughPlayers => ErrorCode::NotEnoughPlayers,
        GameError::NotOwner => ErrorCode::NotOwner,
        GameError::SeatTaken => ErrorCode::SeatTaken,
        GameError::InvalidSeat(_) => ErrorCode::InvalidSeat,
        GameError::ClientNotFound(_) => ErrorCode::NotInGame,
        GameError::Move(_) => ErrorCode::InvalidMove,
        GameError::UnsupportedBoards(_) | GameError::Invariant(_) => ErrorCode::InternalError,
    };
    ServerError::new(code, title, error.to_string())
}
