//! Players and Profiles
//!
//! A player is a profile sitting in a seat. Seat, color and board are
//! always assigned together through [`Player::set_seat`].

use std::collections::BTreeMap;

use crate::core::ids::{ClientId, PieceId, ProfileId};
use crate::core::seat::{BoardIndex, Color, Seat, SeatLayout};
use crate::game::piece::Piece;
use crate::network::client::ClientHandle;

/// Identity of a connected participant.
#[derive(Clone, Debug)]
pub struct Profile {
    /// Public id.
    pub id: ProfileId,
    /// Display name.
    pub nick: String,
    /// Private token handed only to the owner of the profile.
    pub secret: String,
    /// Outbound path to the connection.
    pub client: ClientHandle,
}

impl Profile {
    /// Create a profile with fresh id and secret for a connection.
    pub fn new(client: ClientHandle) -> Self {
        Self {
            id: ProfileId::generate(),
            nick: String::new(),
            secret: uuid::Uuid::new_v4().to_string(),
            client,
        }
    }

    /// Set the display name.
    pub fn with_nick(mut self, nick: impl Into<String>) -> Self {
        self.nick = nick.into();
        self
    }

    /// Connection this profile talks through.
    pub fn client_id(&self) -> ClientId {
        self.client.id()
    }
}

/// A seated player.
#[derive(Clone, Debug)]
pub struct Player {
    /// Who is sitting here.
    pub profile: Profile,
    /// Seat number.
    pub seat: Seat,
    /// Color derived from the seat.
    pub color: Color,
    /// Board derived from the seat.
    pub board: BoardIndex,
    /// True while this player is to move.
    pub my_turn: bool,
    /// Pieces owned by this player.
    pub pieces: BTreeMap<PieceId, Piece>,
}

impl Player {
    /// Seat a profile.
    pub fn new(profile: Profile, seat: Seat, layout: &SeatLayout) -> Self {
        Self {
            profile,
            seat,
            color: layout.color_for(seat),
            board: layout.board_for(seat),
            my_turn: false,
            pieces: BTreeMap::new(),
        }
    }

    /// Move to another seat, recomputing color and board.
    pub fn set_seat(&mut self, seat: Seat, layout: &SeatLayout) {
        self.seat = seat;
        self.color = layout.color_for(seat);
        self.board = layout.board_for(seat);
    }

    /// Replace the piece set with a fresh starting layout.
    pub fn setup_board(&mut self) {
        self.pieces = Piece::starting_set(&self.profile.id, self.color, self.board)
            .into_iter()
            .map(|piece| (piece.id.clone(), piece))
            .collect();
    }

    /// Look up an owned piece.
    pub fn piece(&self, piece_id: &PieceId) -> Option<&Piece> {
        self.pieces.get(piece_id)
    }

    /// Whether this player is connected through `client`.
    pub fn is_client(&self, client: ClientId) -> bool {
        self.profile.client_id() == client
    }
}
