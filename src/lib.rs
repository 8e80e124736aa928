//! # Chess4 Game Server
//!
//! Authoritative server for four-seat chess played on two boards.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CHESS4 SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── ids.rs      - Game, profile, piece and client ids       │
//! │  └── seat.rs     - Seat -> color/board, partner rotation     │
//! │                                                              │
//! │  game/           - Game rules (synchronous)                  │
//! │  ├── piece.rs    - Pieces, locations, move requests          │
//! │  ├── rules.rs    - Movement legality capability              │
//! │  ├── player.rs   - Profiles and seated players               │
//! │  └── state.rs    - Seats, turns, owner, move pipeline        │
//! │                                                              │
//! │  network/        - Concurrency and transport                 │
//! │  ├── actor.rs    - One task per game, serialized commands    │
//! │  ├── broadcast.rs- Snapshots and error payloads              │
//! │  ├── client.rs   - Bounded outbound buffer per connection    │
//! │  ├── session.rs  - Game directory                            │
//! │  ├── protocol.rs - Message types                             │
//! │  └── server.rs   - WebSocket server                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialized Games
//!
//! Each game is owned by exactly one actor task. Connections submit
//! commands into the actor's bounded queue; the actor applies them one at
//! a time and broadcasts the resulting snapshot, so every player sees the
//! same sequence of states.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::ids::{ClientId, GameId, PieceId, ProfileId};
pub use crate::core::seat::{Color, Seat, SeatLayout};
pub use game::state::{GameError, GameSettings, GameState, MoveRejection};
pub use network::actor::{ActorError, GameActor, GameHandle};
pub use network::server::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
