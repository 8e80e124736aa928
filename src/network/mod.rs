//! Network Layer
//!
//! Game actors, the session directory and the WebSocket server.
//! Game state is only ever touched by its actor - everything else
//! talks to it through a [`GameHandle`].

pub mod actor;
pub mod broadcast;
pub mod client;
pub mod protocol;
pub mod session;
pub mod server;

pub use actor::{ActorError, GameActor, GameCommand, GameHandle};
pub use client::{ClientHandle, ClientOutbound, Delivery};
pub use protocol::{
    ClientMessage, ServerMessage, GameSnapshot, PlayerSnapshot, ServerError, ErrorCode,
};
pub use session::{SessionError, SessionManager};
pub use server::{GameServer, ServerConfig, GameServerError};
