//! Game State and Seat/Turn Machine
//!
//! All state of one game and every transition on it: join, start,
//! change seat, remove client, and the move validation pipeline.
//!
//! Nothing here is async or shared. The game actor owns the only
//! instance and calls these methods one command at a time.
//! Seats live in a `BTreeMap` so every "pick a player" rule iterates in
//! ascending seat order.

use std::collections::BTreeMap;

use crate::core::ids::{ClientId, GameId, PieceId, ProfileId};
use crate::core::seat::{Seat, SeatLayout, MAX_SUPPORTED_BOARDS};
use crate::game::piece::{MoveRequest, Piece, PieceLocation};
use crate::game::player::{Player, Profile};
use crate::game::rules::MovementRules;

// =============================================================================
// ERRORS
// =============================================================================

/// Why a move was refused. None of these change state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    /// Target equals where the piece already is.
    #[error("Piece is already there")]
    NoOp,

    /// Piece belongs to another player.
    #[error("Not your piece")]
    NotOwner,

    /// Mover does not hold the turn.
    #[error("Not your turn")]
    NotYourTurn,

    /// No piece with this id in the game.
    #[error("Unknown piece: {0}")]
    UnknownPiece(PieceId),

    /// Target is neither a board square nor the cache.
    #[error("Invalid target location")]
    InvalidTarget,

    /// Movement rules refused the move.
    #[error("Illegal move")]
    IllegalMove,
}

/// Game errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Board count other than the supported one.
    #[error("Unsupported board count: {0}")]
    UnsupportedBoards(u8),

    /// Every seat is taken.
    #[error("Game is full")]
    GameFull,

    /// Operation only allowed before the start.
    #[error("Game already started")]
    GameStarted,

    /// Everyone left; the game takes no new players.
    #[error("Game is closed")]
    GameClosed,

    /// Profile already has a seat in this game.
    #[error("Already seated")]
    AlreadySeated,

    /// Start requested without enough players.
    #[error("Not enough players")]
    NotEnoughPlayers,

    /// Only the owner may do this.
    #[error("Only the owner can start the game")]
    NotOwner,

    /// Target seat is occupied.
    #[error("Seat taken")]
    SeatTaken,

    /// Seat number outside the layout.
    #[error("Invalid seat: {0}")]
    InvalidSeat(Seat),

    /// Client is not seated in this game.
    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    /// Move refused.
    #[error(transparent)]
    Move(#[from] MoveRejection),

    /// Internal invariant broken.
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl GameError {
    /// Errors that indicate a bug rather than a bad request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GameError::ClientNotFound(_) | GameError::Invariant(_))
    }
}

// =============================================================================
// SETTINGS & OUTCOMES
// =============================================================================

/// Per-game settings chosen at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    /// Number of boards; only 2 is supported.
    pub boards: u8,
    /// Allow the owner to start with empty seats.
    pub can_start_before_full: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            boards: MAX_SUPPORTED_BOARDS,
            can_start_before_full: false,
        }
    }
}

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Seat that moved.
    pub seat: Seat,
    /// Where the piece went.
    pub target: PieceLocation,
    /// Seat now holding the turn.
    pub next_turn: Seat,
}

/// Result of removing a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// Seat that was vacated.
    pub seat: Seat,
    /// Players still seated.
    pub remaining: usize,
    /// Owner after the removal.
    pub owner: Option<ProfileId>,
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Full state of one game.
#[derive(Debug, Clone)]
pub struct GameState {
    id: GameId,
    title: String,
    layout: SeatLayout,
    started: bool,
    closed: bool,
    can_start_before_full: bool,
    owner: Option<ProfileId>,
    seats: BTreeMap<Seat, Player>,
}

impl GameState {
    /// Create a game; the creator takes seat 1 and becomes owner.
    pub fn new(id: GameId, creator: Profile, settings: GameSettings) -> Result<Self, GameError> {
        let layout = SeatLayout::for_boards(settings.boards)
            .ok_or(GameError::UnsupportedBoards(settings.boards))?;

        let title = format!("{}'s game", creator.nick);
        let owner = Some(creator.id.clone());
        let mut seats = BTreeMap::new();
        seats.insert(1, Player::new(creator, 1, &layout));

        Ok(Self {
            id,
            title,
            layout,
            started: false,
            closed: false,
            can_start_before_full: settings.can_start_before_full,
            owner,
            seats,
        })
    }

    /// Game id.
    pub fn id(&self) -> &GameId {
        &self.id
    }

    /// Display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Seat layout.
    pub fn layout(&self) -> &SeatLayout {
        &self.layout
    }

    /// Whether the game has started.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether the last player has left.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the owner may start before every seat is filled.
    pub fn can_start_before_full(&self) -> bool {
        self.can_start_before_full
    }

    /// Current owner.
    pub fn owner(&self) -> Option<&ProfileId> {
        self.owner.as_ref()
    }

    /// Seated players by seat.
    pub fn seats(&self) -> &BTreeMap<Seat, Player> {
        &self.seats
    }

    /// Number of seated players.
    pub fn player_count(&self) -> usize {
        self.seats.len()
    }

    /// Seat capacity.
    pub fn max_players(&self) -> usize {
        usize::from(self.layout.max_players())
    }

    /// Player connected through `client`.
    pub fn player_by_client(&self, client: ClientId) -> Option<&Player> {
        self.seats.values().find(|p| p.is_client(client))
    }

    /// Seat holding the turn, if any.
    pub fn turn_holder(&self) -> Option<Seat> {
        self.seats.values().find(|p| p.my_turn).map(|p| p.seat)
    }

    fn seat_of(&self, client: ClientId) -> Result<Seat, GameError> {
        self.player_by_client(client)
            .map(|p| p.seat)
            .ok_or(GameError::ClientNotFound(client))
    }

    fn find_piece(&self, piece_id: &PieceId) -> Option<(Seat, &Piece)> {
        self.seats
            .iter()
            .find_map(|(seat, player)| player.piece(piece_id).map(|piece| (*seat, piece)))
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Seat a profile in the lowest empty seat.
    ///
    /// A game emptied by its last leave stays closed.
    pub fn join(&mut self, profile: Profile) -> Result<Seat, GameError> {
        if self.closed {
            return Err(GameError::GameClosed);
        }
        if self.started {
            return Err(GameError::GameStarted);
        }

        let seated = self.seats.values().any(|p| {
            p.profile.id == profile.id || p.is_client(profile.client_id())
        });
        if seated {
            return Err(GameError::AlreadySeated);
        }

        let seat = self
            .layout
            .seats()
            .find(|seat| !self.seats.contains_key(seat))
            .ok_or(GameError::GameFull)?;

        self.seats.insert(seat, Player::new(profile, seat, &self.layout));
        Ok(seat)
    }

    /// Start the game. Returns the seat that moves first.
    pub fn start(&mut self, client: ClientId) -> Result<Seat, GameError> {
        let seat = self.seat_of(client)?;
        let requester = &self.seats[&seat].profile.id;
        if self.owner.as_ref() != Some(requester) {
            return Err(GameError::NotOwner);
        }

        if self.started {
            return Err(GameError::GameStarted);
        }

        if !self.can_start_before_full && self.seats.len() != self.max_players() {
            return Err(GameError::NotEnoughPlayers);
        }

        for player in self.seats.values_mut() {
            player.setup_board();
            player.my_turn = false;
        }

        // Seat 1 when occupied, otherwise the lowest occupied seat
        let first = *self
            .seats
            .keys()
            .next()
            .ok_or_else(|| GameError::Invariant("started a game with no players".to_string()))?;
        self.set_turn(first);
        self.started = true;

        Ok(first)
    }

    /// Move a player to an empty seat before the start. Returns the seat it
    /// left.
    pub fn change_seat(&mut self, client: ClientId, seat: Seat) -> Result<Seat, GameError> {
        // Pieces are colored at start; a seated player keeps its color.
        if self.started {
            return Err(GameError::GameStarted);
        }
        if !self.layout.is_valid_seat(seat) {
            return Err(GameError::InvalidSeat(seat));
        }
        if self.seats.contains_key(&seat) {
            return Err(GameError::SeatTaken);
        }

        let old = self.seat_of(client)?;
        let mut player = self
            .seats
            .remove(&old)
            .ok_or_else(|| GameError::Invariant(format!("seat {old} vanished")))?;
        player.set_seat(seat, &self.layout);
        self.seats.insert(seat, player);

        Ok(old)
    }

    /// Vacate the seat of `client`, reassigning owner and turn as needed.
    pub fn remove_client(&mut self, client: ClientId) -> Result<Removal, GameError> {
        let seat = self.seat_of(client)?;
        if let Some(owner) = &self.owner {
            if !self.seats.values().any(|p| &p.profile.id == owner) {
                return Err(GameError::Invariant(format!("owner {owner} is not seated")));
            }
        }

        let removed = self
            .seats
            .remove(&seat)
            .ok_or_else(|| GameError::Invariant(format!("seat {seat} vanished")))?;

        if self.owner.as_ref() == Some(&removed.profile.id) {
            self.owner = self.seats.values().next().map(|p| p.profile.id.clone());
        }

        if self.started && removed.my_turn {
            let next = self
                .layout
                .partner_of(seat)
                .filter(|partner| self.seats.contains_key(partner))
                .or_else(|| self.seats.keys().next().copied());
            if let Some(next) = next {
                self.set_turn(next);
            }
        }

        if self.seats.is_empty() {
            self.closed = true;
        }

        Ok(Removal {
            seat,
            remaining: self.seats.len(),
            owner: self.owner.clone(),
        })
    }

    /// Run a move through the validation pipeline and apply it.
    pub fn apply_move(
        &mut self,
        client: ClientId,
        request: &MoveRequest,
        rules: &dyn MovementRules,
    ) -> Result<MoveOutcome, GameError> {
        let mover_seat = self.seat_of(client)?;
        let mover = &self.seats[&mover_seat];
        let found = self.find_piece(&request.piece_id);

        // 1. Nothing to do
        if let Some((_, piece)) = found {
            if piece.location == request.requested_location() {
                return Err(MoveRejection::NoOp.into());
            }
        }

        // 2. Ownership
        if let Some((_, piece)) = found {
            if piece.owner != mover.profile.id {
                return Err(MoveRejection::NotOwner.into());
            }
        }

        // 3. Turn
        if !mover.my_turn {
            return Err(MoveRejection::NotYourTurn.into());
        }

        // 4. Existence
        let (owner_seat, piece) =
            found.ok_or_else(|| MoveRejection::UnknownPiece(request.piece_id.clone()))?;

        // 5. Board square or cache, never neither
        let target = request
            .target(self.layout.boards())
            .ok_or(MoveRejection::InvalidTarget)?;

        // 6. Piece-specific legality
        if !rules.can_move_like_that(piece, mover.color, request) {
            return Err(MoveRejection::IllegalMove.into());
        }

        // 7. Apply
        let piece_id = piece.id.clone();
        self.seats
            .get_mut(&owner_seat)
            .and_then(|player| player.pieces.get_mut(&piece_id))
            .ok_or_else(|| GameError::Invariant(format!("piece {piece_id} vanished")))?
            .apply(target);

        let next_turn = self.advance_turn(mover_seat)?;

        Ok(MoveOutcome {
            seat: mover_seat,
            target,
            next_turn,
        })
    }

    /// Pass the turn from `seat` to its rotation partner.
    ///
    /// If the partner seat is empty the mover keeps the turn.
    fn advance_turn(&mut self, seat: Seat) -> Result<Seat, GameError> {
        let partner = self
            .layout
            .partner_of(seat)
            .ok_or_else(|| GameError::Invariant(format!("seat {seat} has no partner")))?;
        let next = if self.seats.contains_key(&partner) { partner } else { seat };
        self.set_turn(next);
        Ok(next)
    }

    fn set_turn(&mut self, seat: Seat) {
        for player in self.seats.values_mut() {
            player.my_turn = player.seat == seat;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
