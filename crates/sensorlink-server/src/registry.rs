//! Registry of connected telemetry viewers.
//!
//! Each entry holds an opaque sink plus a liveness flag. Delivery never
//! blocks: a sink that cannot take a frame right now is marked dead and
//! pruned on the next snapshot, so one stalled viewer cannot hold up the
//! others.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Why a frame could not be handed to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("client queue full")]
    Full,

    #[error("client disconnected")]
    Closed,
}

/// Destination for frames addressed to one client.
pub trait ClientSink: Send + Sync {
    /// Queue one frame without waiting.
    fn send(&self, frame: &str) -> Result<(), SendError>;

    /// True once the receiving side has gone away.
    fn is_closed(&self) -> bool {
        false
    }
}

/// A bounded per-connection queue drained by the connection task.
impl ClientSink for mpsc::Sender<String> {
    fn send(&self, frame: &str) -> Result<(), SendError> {
        self.try_send(frame.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn is_closed(&self) -> bool {
        mpsc::Sender::is_closed(self)
    }
}

/// Identifies a registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// A registered client, as returned by [`ClientRegistry::snapshot`].
#[derive(Clone)]
pub struct ClientHandle {
    id: ClientId,
    sink: Arc<dyn ClientSink>,
    alive: Arc<AtomicBool>,
}

impl ClientHandle {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.sink.is_closed()
    }

    /// Send one frame. On failure the handle is marked dead.
    pub fn send(&self, frame: &str) -> Result<(), SendError> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(SendError::Closed);
        }
        self.sink.send(frame).map_err(|e| {
            self.alive.store(false, Ordering::Release);
            e
        })
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Registered clients in registration order.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<Vec<ClientHandle>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ClientHandle>> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ClientHandle>> {
        self.clients.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a client that has completed the handshake.
    pub fn register(&self, sink: Arc<dyn ClientSink>) -> ClientId {
        let handle = ClientHandle {
            id: ClientId::new(),
            sink,
            alive: Arc::new(AtomicBool::new(true)),
        };
        let id = handle.id;
        self.write().push(handle);
        debug!("Client {} registered", id);
        id
    }

    /// Remove a client. Returns false if it was already gone.
    pub fn unregister(&self, id: ClientId) -> bool {
        let mut clients = self.write();
        let before = clients.len();
        clients.retain(|c| c.id != id);
        let removed = clients.len() != before;
        if removed {
            debug!("Client {} unregistered", id);
        }
        removed
    }

    /// Live clients, in registration order. Drops dead entries first.
    pub fn snapshot(&self) -> Vec<ClientHandle> {
        let needs_prune = self.read().iter().any(|c| !c.is_alive());
        if needs_prune {
            self.write().retain(|c| {
                let alive = c.is_alive();
                if !alive {
                    debug!("Client {} pruned", c.id);
                }
                alive
            });
        }
        self.read().clone()
    }

    /// Drop every client, closing their queues. Returns how many there were.
    pub fn clear(&self) -> usize {
        let mut clients = self.write();
        let count = clients.len();
        clients.clear();
        count
    }

    /// Number of entries, including any not yet pruned.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Send `frame` to every live client. Failures do not stop delivery.
    pub fn broadcast(&self, frame: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for client in self.snapshot() {
            match client.send(frame) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!("Dropping client {}: {}", client.id, e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}
