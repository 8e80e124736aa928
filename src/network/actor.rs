//! Game Actor
//!
//! One task per game owns the [`GameState`] and applies commands from a
//! bounded queue strictly one at a time. Connection tasks only ever talk
//! to a game through its [`GameHandle`]; no lock guards game state.
//!
//! ```text
//!  conn task ─┐
//!  conn task ─┼─> mpsc (bounded) ──> GameActor::run ──> broadcast ──> client buffers
//!  conn task ─┘                          ^
//!                      stop (oneshot) ───┘
//! ```
//!
//! After stop, commands still queued are answered with
//! [`ActorError::Stopped`] and new submissions fail the same way.

use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::core::ids::{ClientId, GameId};
use crate::core::seat::Seat;
use crate::game::piece::MoveRequest;
use crate::game::player::Profile;
use crate::game::rules::MovementRules;
use crate::game::state::{GameError, GameState, MoveOutcome, Removal};
use crate::network::broadcast::{
    self, JOIN_FAILED, LEAVE_FAILED, MOVE_FAILED, SEAT_CHANGE_FAILED, START_FAILED,
};
use crate::network::client::ClientHandle;
use crate::network::protocol::{GameSnapshot, ServerMessage};

/// Reply channel carried by every command.
pub type Reply<T> = oneshot::Sender<Result<T, ActorError>>;

/// Work a game actor accepts.
#[derive(Debug)]
pub enum GameCommand {
    /// Seat a profile.
    Join {
        /// Joining profile.
        profile: Profile,
        /// Assigned seat.
        reply: Reply<Seat>,
    },
    /// Start the game.
    Start {
        /// Requesting client (must own the game).
        client: ClientId,
        /// Seat that moves first.
        reply: Reply<Seat>,
    },
    /// Move a piece.
    Move {
        /// Moving client.
        client: ClientId,
        /// Requested move.
        request: MoveRequest,
        /// Accepted move.
        reply: Reply<MoveOutcome>,
    },
    /// Move a player to an empty seat.
    ChangeSeat {
        /// Requesting client.
        client: ClientId,
        /// Target seat.
        seat: Seat,
        /// Seat that was left.
        reply: Reply<Seat>,
    },
    /// Vacate a client's seat.
    RemoveClient {
        /// Leaving client.
        client: ClientId,
        /// What the removal changed.
        reply: Reply<Removal>,
    },
    /// Push a raw message to every seated player.
    Announce {
        /// Message to deliver.
        message: ServerMessage,
        /// Number of players that accepted it.
        reply: Reply<usize>,
    },
    /// Read the current state without changing it.
    Snapshot {
        /// Current snapshot.
        reply: Reply<GameSnapshot>,
    },
}

impl GameCommand {
    fn name(&self) -> &'static str {
        match self {
            GameCommand::Join { .. } => "join",
            GameCommand::Start { .. } => "start",
            GameCommand::Move { .. } => "move",
            GameCommand::ChangeSeat { .. } => "change_seat",
            GameCommand::RemoveClient { .. } => "remove_client",
            GameCommand::Announce { .. } => "announce",
            GameCommand::Snapshot { .. } => "snapshot",
        }
    }

    /// Answer the command with `error` without running it.
    fn reject(self, error: ActorError) {
        match self {
            GameCommand::Join { reply, .. } => { let _ = reply.send(Err(error)); }
            GameCommand::Start { reply, .. } => { let _ = reply.send(Err(error)); }
            GameCommand::Move { reply, .. } => { let _ = reply.send(Err(error)); }
            GameCommand::ChangeSeat { reply, .. } => { let _ = reply.send(Err(error)); }
            GameCommand::RemoveClient { reply, .. } => { let _ = reply.send(Err(error)); }
            GameCommand::Announce { reply, .. } => { let _ = reply.send(Err(error)); }
            GameCommand::Snapshot { reply } => { let _ = reply.send(Err(error)); }
        }
    }
}

/// Actor errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActorError {
    /// Actor no longer processes commands.
    #[error("Game actor stopped")]
    Stopped,

    /// `stop` was already called.
    #[error("Game actor already stopped")]
    AlreadyStopped,

    /// Command ran and was refused.
    #[error(transparent)]
    Game(#[from] GameError),
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable address of a running game.
#[derive(Clone, Debug)]
pub struct GameHandle {
    id: GameId,
    title: String,
    sender: mpsc::Sender<GameCommand>,
    stop: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl GameHandle {
    /// Game id.
    pub fn id(&self) -> &GameId {
        &self.id
    }

    /// Game title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Enqueue a raw command, waiting while the queue is full.
    pub async fn submit(&self, command: GameCommand) -> Result<(), ActorError> {
        self.sender.send(command).await.map_err(|_| ActorError::Stopped)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> GameCommand,
    ) -> Result<T, ActorError> {
        let (reply, response) = oneshot::channel();
        self.submit(build(reply)).await?;
        response.await.map_err(|_| ActorError::Stopped)?
    }

    /// Seat `profile` in the lowest free seat.
    pub async fn join(&self, profile: Profile) -> Result<Seat, ActorError> {
        self.request(|reply| GameCommand::Join { profile, reply }).await
    }

    /// Start the game on behalf of `client`.
    pub async fn start(&self, client: ClientId) -> Result<Seat, ActorError> {
        self.request(|reply| GameCommand::Start { client, reply }).await
    }

    /// Move a piece on behalf of `client`.
    pub async fn make_move(
        &self,
        client: ClientId,
        request: MoveRequest,
    ) -> Result<MoveOutcome, ActorError> {
        self.request(|reply| GameCommand::Move { client, request, reply }).await
    }

    /// Move `client` to `seat`.
    pub async fn change_seat(&self, client: ClientId, seat: Seat) -> Result<Seat, ActorError> {
        self.request(|reply| GameCommand::ChangeSeat { client, seat, reply }).await
    }

    /// Remove `client` from the game.
    pub async fn remove_client(&self, client: ClientId) -> Result<Removal, ActorError> {
        self.request(|reply| GameCommand::RemoveClient { client, reply }).await
    }

    /// Deliver `message` to every seated player.
    pub async fn announce(&self, message: ServerMessage) -> Result<usize, ActorError> {
        self.request(|reply| GameCommand::Announce { message, reply }).await
    }

    /// Current state snapshot.
    pub async fn snapshot(&self) -> Result<GameSnapshot, ActorError> {
        self.request(|reply| GameCommand::Snapshot { reply }).await
    }

    /// Ask the actor to stop. Only the first call succeeds.
    pub fn stop(&self) -> Result<(), ActorError> {
        let sender = self
            .stop
            .lock()
            .map_err(|_| ActorError::Stopped)?
            .take()
            .ok_or(ActorError::AlreadyStopped)?;
        // The actor may already have exited on its own
        let _ = sender.send(());
        Ok(())
    }

    /// Whether the actor has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// =============================================================================
// ACTOR
// =============================================================================

/// Sole owner of one game's state.
pub struct GameActor {
    state: GameState,
    rules: Arc<dyn MovementRules>,
    inbox: mpsc::Receiver<GameCommand>,
    stop: oneshot::Receiver<()>,
    revision: u64,
}

impl GameActor {
    /// Create an actor and its handle. Nothing runs until [`GameActor::run`].
    pub fn new(
        state: GameState,
        rules: Arc<dyn MovementRules>,
        queue_capacity: usize,
    ) -> (Self, GameHandle) {
        let (sender, inbox) = mpsc::channel(queue_capacity.max(1));
        let (stop_tx, stop) = oneshot::channel();

        let handle = GameHandle {
            id: state.id().clone(),
            title: state.title().to_string(),
            sender,
            stop: Arc::new(Mutex::new(Some(stop_tx))),
        };

        let actor = Self {
            state,
            rules,
            inbox,
            stop,
            revision: 0,
        };

        (actor, handle)
    }

    /// Create an actor and run it on a new task.
    pub fn spawn(
        state: GameState,
        rules: Arc<dyn MovementRules>,
        queue_capacity: usize,
    ) -> (GameHandle, JoinHandle<GameState>) {
        let (actor, handle) = Self::new(state, rules, queue_capacity);
        (handle, tokio::spawn(actor.run()))
    }

    /// Process commands until stopped. Returns the final state.
    pub async fn run(mut self) -> GameState {
        info!("Game {} '{}' running", self.state.id(), self.state.title());
        broadcast::broadcast(&self.state, self.revision);

        loop {
            tokio::select! {
                biased;
                // A dropped stop sender counts as a stop request
                _ = &mut self.stop => break,
                command = self.inbox.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }

        self.inbox.close();
        let mut dropped = 0usize;
        while let Ok(command) = self.inbox.try_recv() {
            command.reject(ActorError::Stopped);
            dropped += 1;
        }

        info!(
            "Game {} stopped after {} commands ({} dropped)",
            self.state.id(),
            self.revision,
            dropped
        );
        self.state
    }

    fn handle(&mut self, command: GameCommand) {
        debug!("Game {} <- {}", self.state.id(), command.name());

        match command {
            GameCommand::Join { profile, reply } => {
                let client = profile.client.clone();
                let result = self.state.join(profile);
                self.conclude(result, Some(&client), JOIN_FAILED, reply);
            }
            GameCommand::Start { client, reply } => {
                let result = self.state.start(client);
                let requester = self.client_handle(client);
                self.conclude(result, requester.as_ref(), START_FAILED, reply);
            }
            GameCommand::Move { client, request, reply } => {
                self.revision += 1;
                let result = self.state.apply_move(client, &request, self.rules.as_ref());
                if let Err(error) = &result {
                    let mover = self.client_handle(client);
                    self.report(MOVE_FAILED, mover.as_ref(), error);
                }
                // Every move command is followed by a broadcast, accepted or not
                broadcast::broadcast(&self.state, self.revision);
                let _ = reply.send(result.map_err(ActorError::from));
            }
            GameCommand::ChangeSeat { client, seat, reply } => {
                let requester = self.client_handle(client);
                let result = self.state.change_seat(client, seat);
                self.conclude(result, requester.as_ref(), SEAT_CHANGE_FAILED, reply);
            }
            GameCommand::RemoveClient { client, reply } => {
                let result = self.state.remove_client(client);
                self.conclude(result, None, LEAVE_FAILED, reply);
            }
            GameCommand::Announce { message, reply } => {
                let _ = reply.send(Ok(broadcast::announce(&self.state, &message)));
            }
            GameCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(broadcast::snapshot(&self.state, self.revision)));
            }
        }
    }

    /// Broadcast on success, report on failure, then answer the caller.
    fn conclude<T>(
        &mut self,
        result: Result<T, GameError>,
        requester: Option<&ClientHandle>,
        title: &str,
        reply: Reply<T>,
    ) {
        match &result {
            Ok(_) => {
                self.revision += 1;
                broadcast::broadcast(&self.state, self.revision);
            }
            Err(error) => self.report(title, requester, error),
        }
        let _ = reply.send(result.map_err(ActorError::from));
    }

    fn report(&self, title: &str, requester: Option<&ClientHandle>, error: &GameError) {
        if error.is_fatal() {
            error!("Game {}: {}: {}", self.state.id(), title, error);
        } else {
            debug!("Game {}: {}: {}", self.state.id(), title, error);
        }

        if let Some(client) = requester {
            client.deliver(ServerMessage::Error(broadcast::error_payload(title, error)));
        }
    }

    fn client_handle(&self, client: ClientId) -> Option<ClientHandle> {
        self.state
            .player_by_client(client)
            .map(|player| player.profile.client.clone())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::core::seat::Color;
    use crate::game::piece::{Piece, PieceKind, PieceLocation};
    use crate::game::rules::BasicRules;
    use crate::game::state::{GameSettings, MoveRejection};
    use crate::network::client::ClientOutbound;
    use crate::network::protocol::ErrorCode;
    use proptest::prelude::*;

    fn profile(id: u64) -> (Profile, ClientOutbound) {
        let (client, outbound) = ClientHandle::channel(ClientId(id), 64);
        (Profile::new(client).with_nick(format!("p{id}")), outbound)
    }

    fn spawn_game(settings: GameSettings) -> (GameHandle, ClientOutbound) {
        let (creator, outbound) = profile(1);
        let state = GameState::new(GameId::generate(), creator, settings).unwrap();
        let (handle, _task) = GameActor::spawn(state, Arc::new(BasicRules), 256);
        (handle, outbound)
    }

    /// Spawned, started four-player game; seat N is ClientId(N).
    async fn started_game() -> (GameHandle, Vec<ClientOutbound>) {
        let (handle, first) = spawn_game(GameSettings::default());
        let mut outbounds = vec![first];
        for id in 2..=4 {
            let (p, outbound) = profile(id);
            handle.join(p).await.unwrap();
            outbounds.push(outbound);
        }
        handle.start(ClientId(1)).await.unwrap();
        (handle, outbounds)
    }

    fn pawn_push(snapshot: &GameSnapshot, seat: Seat) -> MoveRequest {
        let player = &snapshot.seats[&seat.to_string()];
        let pawn: &Piece = player
            .pieces
            .iter()
            .find(|p| p.kind == PieceKind::Pawn)
            .unwrap();
        let PieceLocation::Board { board, x, y } = pawn.location else {
            panic!("pawn off board");
        };
        let to_y = if player.color == Color::White { y + 1 } else { y - 1 };
        MoveRequest {
            piece_id: pawn.id.clone(),
            from_x: x,
            from_y: y,
            to_x: x,
            to_y,
            board,
            cache: false,
        }
    }

    async fn next_message(outbound: &mut ClientOutbound) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(1), outbound.recv())
            .await
            .expect("message within timeout")
            .expect("channel open")
    }

    /// Drain buffered messages, returning the last state and any errors.
    fn drain(outbound: &mut ClientOutbound) -> (Option<GameSnapshot>, Vec<crate::network::protocol::ServerError>) {
        let mut last = None;
        let mut errors = Vec::new();
        while let Some(Some(message)) = futures_util::FutureExt::now_or_never(outbound.recv()) {
            match message {
                ServerMessage::State(snapshot) => last = Some(snapshot),
                ServerMessage::Error(error) => errors.push(error),
                _ => {}
            }
        }
        (last, errors)
    }

    #[tokio::test]
    async fn test_join_broadcasts_to_all_seats() {
        let (handle, mut first) = spawn_game(GameSettings::default());
        let (p2, mut second) = profile(2);

        assert_eq!(handle.join(p2).await, Ok(2));

        let (state1, _) = drain(&mut first);
        let (state2, _) = drain(&mut second);
        let state1 = state1.unwrap();
        assert_eq!(state1.seats.len(), 2);
        assert_eq!(state1, state2.unwrap());
    }

    #[tokio::test]
    async fn test_turn_rotation_example() {
        let (handle, mut outbounds) = started_game().await;
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.seats["1"].my_turn);

        // Seat 1 moves, the turn goes to seat 3
        let outcome = handle.make_move(ClientId(1), pawn_push(&snapshot, 1)).await.unwrap();
        assert_eq!(outcome.next_turn, 3);

        // Seat 2 is refused and told so
        let before = handle.snapshot().await.unwrap();
        let result = handle.make_move(ClientId(2), pawn_push(&before, 2)).await;
        assert_eq!(result, Err(ActorError::Game(MoveRejection::NotYourTurn.into())));

        let after = handle.snapshot().await.unwrap();
        assert_eq!(after.seats, before.seats);
        assert!(after.seats["3"].my_turn);
        assert_eq!(after.seats.values().filter(|p| p.my_turn).count(), 1);

        let (_, errors) = drain(&mut outbounds[1]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, MOVE_FAILED);
        assert_eq!(errors[0].code, ErrorCode::InvalidMove);

        // Rejected moves still broadcast to everyone
        let (last, _) = drain(&mut outbounds[3]);
        assert_eq!(last.unwrap().revision, after.revision);
    }

    #[tokio::test]
    async fn test_start_not_enough_players_reported_to_owner() {
        let (handle, mut owner) = spawn_game(GameSettings::default());
        let (p2, mut other) = profile(2);
        handle.join(p2).await.unwrap();
        drain(&mut owner);
        drain(&mut other);

        let result = handle.start(ClientId(1)).await;
        assert_eq!(result, Err(ActorError::Game(GameError::NotEnoughPlayers)));

        match next_message(&mut owner).await {
            ServerMessage::Error(error) => {
                assert_eq!(error.title, "Failed to start game");
                assert_eq!(error.message, "Not enough players");
            }
            other => panic!("unexpected: {other:?}"),
        }
        let (state, errors) = drain(&mut other);
        assert!(state.is_none());
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_change_seat_taken_reported() {
        let (handle, _owner) = spawn_game(GameSettings::default());
        let (p2, mut second) = profile(2);
        handle.join(p2).await.unwrap();
        drain(&mut second);

        let result = handle.change_seat(ClientId(2), 1).await;
        assert_eq!(result, Err(ActorError::Game(GameError::SeatTaken)));

        match next_message(&mut second).await {
            ServerMessage::Error(error) => {
                assert_eq!(error.title, "Failed to move seats");
                assert_eq!(error.message, "Seat taken");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_change_seat_after_start_reported() {
        let (handle, mut outbounds) = started_game().await;
        handle.remove_client(ClientId(4)).await.unwrap();
        for outbound in outbounds.iter_mut() {
            drain(outbound);
        }

        let result = handle.change_seat(ClientId(1), 4).await;
        assert_eq!(result, Err(ActorError::Game(GameError::GameStarted)));

        match next_message(&mut outbounds[0]).await {
            ServerMessage::Error(error) => {
                assert_eq!(error.title, "Failed to move seats");
                assert_eq!(error.code, ErrorCode::GameStarted);
            }
            other => panic!("unexpected: {other:?}"),
        }

        let snapshot = handle.snapshot().await.unwrap();
        let first = &snapshot.seats["1"];
        assert_eq!((first.color, first.board), (Color::White, 1));
        assert!(first.my_turn);
        assert!(!snapshot.seats.contains_key("4"));

        let mv = pawn_push(&snapshot, 1);
        assert!(handle.make_move(ClientId(1), mv).await.is_ok());
    }

    #[tokio::test]
    async fn test_join_queued_behind_last_leave_rejected() {
        let (handle, _owner) = spawn_game(GameSettings::default());
        let (p2, mut second) = profile(2);

        // Both commands sit in the queue before the actor sees either
        let (removal, joined) = tokio::join!(handle.remove_client(ClientId(1)), handle.join(p2));
        assert_eq!(removal.unwrap().remaining, 0);
        assert_eq!(joined, Err(ActorError::Game(GameError::GameClosed)));

        match next_message(&mut second).await {
            ServerMessage::Error(error) => {
                assert_eq!(error.title, "Failed to join game");
                assert_eq!(error.code, ErrorCode::GameNotFound);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(handle.snapshot().await.unwrap().seats.is_empty());
    }

    #[tokio::test]
    async fn test_owner_leaves_lowest_seat_inherits() {
        let (handle, _first) = spawn_game(GameSettings::default());
        let mut keep = Vec::new();
        for id in 2..=4 {
            let (p, outbound) = profile(id);
            handle.join(p).await.unwrap();
            keep.push(outbound);
        }
        handle.remove_client(ClientId(2)).await.unwrap();

        let removal = handle.remove_client(ClientId(1)).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(removal.remaining, 2);
        assert_eq!(snapshot.owner.as_ref(), Some(&snapshot.seats["3"].id));
    }

    #[tokio::test]
    async fn test_concurrent_seat_race_has_one_winner() {
        let (handle, _first) = spawn_game(GameSettings::default());
        let mut keep = Vec::new();
        for id in 2..=3 {
            let (p, outbound) = profile(id);
            handle.join(p).await.unwrap();
            keep.push(outbound);
        }

        let tasks: Vec<_> = (1..=3)
            .map(|id| {
                let handle = handle.clone();
                tokio::spawn(async move { (id, handle.change_seat(ClientId(id), 4).await) })
            })
            .collect();

        let mut winners = Vec::new();
        for task in tasks {
            let (id, result) = task.await.unwrap();
            match result {
                Ok(_) => winners.push(id),
                Err(error) => assert_eq!(error, ActorError::Game(GameError::SeatTaken)),
            }
        }

        assert_eq!(winners.len(), 1);
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.seats.len(), 3);
        let seat4 = &snapshot.seats["4"];
        assert_eq!(seat4.nick, format!("p{}", winners[0]));
        assert_eq!((seat4.color, seat4.board), (Color::Black, 2));
    }

    #[tokio::test]
    async fn test_concurrent_moves_respect_turn_order() {
        let (handle, _outbounds) = started_game().await;
        let snapshot = handle.snapshot().await.unwrap();

        let tasks: Vec<_> = (1..=4u8)
            .map(|seat| {
                let handle = handle.clone();
                let mv = pawn_push(&snapshot, seat);
                tokio::spawn(async move {
                    (seat, handle.make_move(ClientId(u64::from(seat)), mv).await)
                })
            })
            .collect();

        let mut accepted = Vec::new();
        for task in tasks {
            let (seat, result) = task.await.unwrap();
            match result {
                Ok(_) => accepted.push(seat),
                Err(error) => {
                    assert_eq!(error, ActorError::Game(MoveRejection::NotYourTurn.into()));
                }
            }
        }
        accepted.sort();

        let final_state = handle.snapshot().await.unwrap();
        let holder: Vec<_> = final_state.seats.values().filter(|p| p.my_turn).map(|p| p.seat).collect();
        match accepted.as_slice() {
            [1] => assert_eq!(holder, vec![3]),
            [1, 3] => assert_eq!(holder, vec![1]),
            other => panic!("impossible accepted set {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_announce_reaches_seated_players() {
        let (handle, mut first) = spawn_game(GameSettings::default());
        let (p2, mut second) = profile(2);
        handle.join(p2).await.unwrap();
        drain(&mut first);
        drain(&mut second);

        let message = ServerMessage::Shutdown { reason: "maintenance".to_string() };
        assert_eq!(handle.announce(message).await, Ok(2));

        for outbound in [&mut first, &mut second] {
            match next_message(outbound).await {
                ServerMessage::Shutdown { reason } => assert_eq!(reason, "maintenance"),
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_stop_is_single_shot() {
        let (handle, _owner) = spawn_game(GameSettings::default());
        assert_eq!(handle.stop(), Ok(()));
        assert_eq!(handle.stop(), Err(ActorError::AlreadyStopped));
        assert_eq!(handle.clone().stop(), Err(ActorError::AlreadyStopped));

        let (p2, _out) = profile(2);
        assert_eq!(handle.join(p2).await, Err(ActorError::Stopped));
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_queued_commands_fail_after_stop() {
        let (creator, _owner) = profile(1);
        let state = GameState::new(GameId::generate(), creator, GameSettings::default()).unwrap();
        let (actor, handle) = GameActor::new(state, Arc::new(BasicRules), 8);

        let mut pending = Vec::new();
        for _ in 0..3 {
            let (reply, response) = oneshot::channel();
            handle.submit(GameCommand::Snapshot { reply }).await.unwrap();
            pending.push(response);
        }

        handle.stop().unwrap();
        let final_state = actor.run().await;
        assert_eq!(final_state.player_count(), 1);

        for response in pending {
            assert_eq!(response.await.unwrap(), Err(ActorError::Stopped));
        }
    }

    #[tokio::test]
    async fn test_slow_client_is_evicted_without_stalling() {
        let (handle, _owner) = spawn_game(GameSettings::default());
        let (client, slow) = ClientHandle::channel(ClientId(2), 1);
        let p2 = Profile::new(client.clone()).with_nick("slow");
        handle.join(p2).await.unwrap();

        // Never read from `slow`; further broadcasts overflow its buffer
        for seat in [3, 4, 3] {
            let _ = handle.change_seat(ClientId(1), seat).await;
        }

        tokio::time::timeout(Duration::from_secs(1), slow.evicted())
            .await
            .expect("slow client evicted");
        assert!(client.is_evicted());
        assert!(handle.snapshot().await.is_ok());
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    #[derive(Debug, Clone)]
    enum Op {
        Join(u64),
        Start(u64),
        ChangeSeat(u64, Seat),
        Remove(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (2u64..7).prop_map(Op::Join),
            (1u64..7).prop_map(Op::Start),
            ((1u64..7), (1u8..5)).prop_map(|(c, s)| Op::ChangeSeat(c, s)),
            (1u64..7).prop_map(Op::Remove),
        ]
    }

    /// Seat layout of a snapshot, ignoring generated piece ids and revision.
    fn shape(snapshot: &GameSnapshot) -> Vec<(String, String, Seat, bool, usize)> {
        snapshot
            .seats
            .values()
            .map(|p| (p.nick.clone(), p.id.0.clone(), p.seat, p.my_turn, p.pieces.len()))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_actor_matches_sequential_application(
            ops in proptest::collection::vec(op_strategy(), 1..40),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let mut outbounds = Vec::new();
                let profiles: Vec<Profile> = (1..7)
                    .map(|id| {
                        let (p, outbound) = profile(id);
                        outbounds.push(outbound);
                        p
                    })
                    .collect();

                let settings = GameSettings { can_start_before_full: true, ..Default::default() };
                let id = GameId::generate();
                let mut mirror = GameState::new(id.clone(), profiles[0].clone(), settings).unwrap();
                let actor_state = GameState::new(id, profiles[0].clone(), settings).unwrap();
                let (handle, _task) = GameActor::spawn(actor_state, Arc::new(BasicRules), 256);

                for op in ops {
                    let (via_actor, direct) = match op {
                        Op::Join(c) => {
                            let p = profiles[(c - 1) as usize].clone();
                            (handle.join(p.clone()).await.map(|_| ()), mirror.join(p).map(|_| ()))
                        }
                        Op::Start(c) => (
                            handle.start(ClientId(c)).await.map(|_| ()),
                            mirror.start(ClientId(c)).map(|_| ()),
                        ),
                        Op::ChangeSeat(c, s) => (
                            handle.change_seat(ClientId(c), s).await.map(|_| ()),
                            mirror.change_seat(ClientId(c), s).map(|_| ()),
                        ),
                        Op::Remove(c) => (
                            handle.remove_client(ClientId(c)).await.map(|_| ()),
                            mirror.remove_client(ClientId(c)).map(|_| ()),
                        ),
                    };
                    assert_eq!(via_actor, direct.map_err(ActorError::from));
                }

                let snapshot = handle.snapshot().await.unwrap();
                assert_eq!(shape(&snapshot), shape(&broadcast::snapshot(&mirror, 0)));
                assert_eq!(snapshot.owner, mirror.owner().cloned());
                assert_eq!(snapshot.started, mirror.is_started());
            });
        }
    }
}
