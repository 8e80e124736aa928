//! Client Outbound Path
//!
//! Each connection owns a bounded message buffer. Game actors write into
//! it with `try_send` and never wait: a full buffer evicts the client,
//! which makes its connection task close and leave the game.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::warn;

use crate::core::ids::ClientId;
use crate::network::protocol::ServerMessage;

/// What happened to a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the connection.
    Sent,
    /// Buffer overflowed (now or earlier); the client is being disconnected.
    Evicted,
    /// Connection already gone.
    Closed,
}

#[derive(Debug, Default)]
struct Eviction {
    flagged: AtomicBool,
    notify: Notify,
}

impl Eviction {
    async fn wait(&self) {
        let notified = self.notify.notified();
        if self.flagged.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}

/// Sending half, cloned into profiles and game state.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    sender: mpsc::Sender<ServerMessage>,
    eviction: Arc<Eviction>,
}

/// Receiving half, owned by the connection task.
#[derive(Debug)]
pub struct ClientOutbound {
    receiver: mpsc::Receiver<ServerMessage>,
    eviction: Arc<Eviction>,
}

impl ClientHandle {
    /// Create a connection's outbound buffer holding up to `capacity` messages.
    pub fn channel(id: ClientId, capacity: usize) -> (ClientHandle, ClientOutbound) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let eviction = Arc::new(Eviction::default());

        (
            ClientHandle { id, sender, eviction: eviction.clone() },
            ClientOutbound { receiver, eviction },
        )
    }

    /// Connection id.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Queue a message without waiting.
    pub fn deliver(&self, message: ServerMessage) -> Delivery {
        if self.is_evicted() {
            return Delivery::Evicted;
        }

        match self.sender.try_send(message) {
            Ok(()) => Delivery::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Outbound buffer full for {}, disconnecting", self.id);
                self.evict();
                Delivery::Evicted
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Flag the client for disconnection.
    pub fn evict(&self) {
        if !self.eviction.flagged.swap(true, Ordering::SeqCst) {
            self.eviction.notify.notify_waiters();
        }
    }

    /// Whether the client has been evicted.
    pub fn is_evicted(&self) -> bool {
        self.eviction.flagged.load(Ordering::SeqCst)
    }

    /// Resolves once the client has been evicted.
    pub async fn evicted(&self) {
        self.eviction.wait().await
    }
}

impl ClientOutbound {
    /// Next queued message; `None` once every handle is dropped.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.receiver.recv().await
    }

    /// Resolves once the client has been evicted.
    pub async fn evicted(&self) {
        self.eviction.wait().await
    }
}
