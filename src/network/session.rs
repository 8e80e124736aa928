//! Game Session Management
//!
//! Directory of running games. Spawns a game actor on create, routes
//! clients to the actor of the game they sit in, and stops the actor once
//! its last player leaves.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::core::ids::{ClientId, GameId};
use crate::core::seat::Seat;
use crate::game::player::Profile;
use crate::game::rules::{BasicRules, MovementRules};
use crate::game::state::{GameError, GameSettings, GameState, Removal};
use crate::network::actor::{ActorError, GameActor, GameHandle};
use crate::network::broadcast;
use crate::network::protocol::{ErrorCode, GameSummary, ServerError, ServerMessage};

/// Default command queue capacity per game.
pub const DEFAULT_COMMAND_QUEUE: usize = 256;

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No game with that id.
    #[error("Game not found: {0}")]
    GameNotFound(GameId),

    /// Client is not seated in any game.
    #[error("Not in a game")]
    NotInGame,

    /// Client already sits in a game.
    #[error("Already in a game")]
    AlreadyInGame,

    /// Game could not be created.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Game actor refused or could not run the command.
    #[error(transparent)]
    Actor(#[from] ActorError),
}

impl SessionError {
    /// Payload for the requesting client, or `None` when the game actor
    /// has already reported the failure to it.
    pub fn payload(&self, title: &str) -> Option<ServerError> {
        let code = match self {
            SessionError::GameNotFound(_) => ErrorCode::GameNotFound,
            SessionError::NotInGame => ErrorCode::NotInGame,
            SessionError::AlreadyInGame => ErrorCode::AlreadyInGame,
            SessionError::Game(error) => return Some(broadcast::error_payload(title, error)),
            SessionError::Actor(ActorError::Game(_)) => return None,
            SessionError::Actor(_) => ErrorCode::ServerOverloaded,
        };
        Some(ServerError::new(code, title, self.to_string()))
    }
}

/// Manages all running games.
pub struct SessionManager {
    /// Running games.
    games: RwLock<BTreeMap<GameId, GameHandle>>,
    /// Client to game mapping.
    client_games: RwLock<BTreeMap<ClientId, GameId>>,
    /// Legality capability shared by every game.
    rules: Arc<dyn MovementRules>,
    /// Settings for new games.
    settings: GameSettings,
    /// Command queue capacity for new games.
    queue_capacity: usize,
}

impl SessionManager {
    /// Create a session manager using [`BasicRules`].
    pub fn new(settings: GameSettings, queue_capacity: usize) -> Self {
        Self::with_rules(settings, queue_capacity, Arc::new(BasicRules))
    }

    /// Create a session manager with custom movement rules.
    pub fn with_rules(
        settings: GameSettings,
        queue_capacity: usize,
        rules: Arc<dyn MovementRules>,
    ) -> Self {
        Self {
            games: RwLock::new(BTreeMap::new()),
            client_games: RwLock::new(BTreeMap::new()),
            rules,
            settings,
            queue_capacity,
        }
    }

    /// Create a game with `creator` in seat 1.
    pub async fn create_game(&self, creator: Profile) -> Result<GameHandle, SessionError> {
        let client = creator.client_id();
        if self.game_id_for(client).await.is_some() {
            return Err(SessionError::AlreadyInGame);
        }

        let state = GameState::new(GameId::generate(), creator, self.settings)?;
        let (handle, _task) = GameActor::spawn(state, self.rules.clone(), self.queue_capacity);

        self.games.write().await.insert(handle.id().clone(), handle.clone());
        self.client_games.write().await.insert(client, handle.id().clone());

        info!("Game {} '{}' created by {}", handle.id(), handle.title(), client);
        Ok(handle)
    }

    /// Seat `profile` in game `game_id`.
    pub async fn join_game(&self, game_id: &GameId, profile: Profile) -> Result<Seat, SessionError> {
        let client = profile.client_id();
        if self.game_id_for(client).await.is_some() {
            return Err(SessionError::AlreadyInGame);
        }

        let handle = self
            .get_game(game_id)
            .await
            .ok_or_else(|| SessionError::GameNotFound(game_id.clone()))?;

        let seat = handle.join(profile).await?;
        self.client_games.write().await.insert(client, game_id.clone());

        debug!("{} joined game {} in seat {}", client, game_id, seat);
        Ok(seat)
    }

    /// Get a game by id.
    pub async fn get_game(&self, id: &GameId) -> Option<GameHandle> {
        self.games.read().await.get(id).cloned()
    }

    async fn game_id_for(&self, client: ClientId) -> Option<GameId> {
        self.client_games.read().await.get(&client).cloned()
    }

    /// Game the client sits in.
    pub async fn game_for_client(&self, client: ClientId) -> Result<GameHandle, SessionError> {
        let game_id = self.game_id_for(client).await.ok_or(SessionError::NotInGame)?;
        self.get_game(&game_id)
            .await
            .ok_or(SessionError::GameNotFound(game_id))
    }

    /// Every running game.
    pub async fn list_games(&self) -> Vec<GameSummary> {
        self.games
            .read()
            .await
            .values()
            .map(|handle| GameSummary {
                id: handle.id().clone(),
                title: handle.title().to_string(),
            })
            .collect()
    }

    /// Remove `client` from its game. Stops the game once nobody is left.
    pub async fn leave(&self, client: ClientId) -> Result<Removal, SessionError> {
        let game_id = self
            .client_games
            .write()
            .await
            .remove(&client)
            .ok_or(SessionError::NotInGame)?;

        let handle = self
            .get_game(&game_id)
            .await
            .ok_or_else(|| SessionError::GameNotFound(game_id.clone()))?;

        let removal = handle.remove_client(client).await?;
        debug!("{} left game {} (seat {})", client, game_id, removal.seat);

        if removal.remaining == 0 {
            self.remove_game(&game_id).await;
        }

        Ok(removal)
    }

    /// Stop and forget a game.
    pub async fn remove_game(&self, id: &GameId) {
        let removed = self.games.write().await.remove(id);
        let Some(handle) = removed else {
            return;
        };

        if let Err(e) = handle.stop() {
            warn!("Game {} stop: {}", id, e);
        }
        self.client_games.write().await.retain(|_, game| game != id);
        info!("Game {} closed", id);
    }

    /// Number of running games.
    pub async fn session_count(&self) -> usize {
        self.games.read().await.len()
    }

    /// Tell every seated player the server is going down, then stop every game.
    ///
    /// Client mappings are kept so late lookups report `GameNotFound`
    /// rather than `NotInGame`.
    pub async fn shutdown(&self, reason: &str) {
        let games: Vec<GameHandle> = {
            let mut games = self.games.write().await;
            std::mem::take(&mut *games).into_values().collect()
        };

        for handle in games {
            let message = ServerMessage::Shutdown { reason: reason.to_string() };
            if let Err(e) = handle.announce(message).await {
                debug!("Game {} shutdown notice: {}", handle.id(), e);
            }
            if let Err(e) = handle.stop() {
                warn!("Game {} stop: {}", handle.id(), e);
            }
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(GameSettings::default(), DEFAULT_COMMAND_QUEUE)
    }
}
