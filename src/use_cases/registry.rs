// Client registry: the live connections and the channel each one listens on.

use axum::extract::ws::Utf8Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock, mpsc};
use uuid::Uuid;

use crate::domain::Channel;

/// Opaque 128-bit connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Reasons a frame could not be queued for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbound queue full")]
    QueueFull,
    #[error("connection closed")]
    Closed,
}

/// Write side of one connection.
///
/// Frames are queued to the connection worker, which owns the socket. `close` asks the worker
/// to shut the socket down; the signal is latched so it is not lost if the worker is busy.
#[derive(Clone)]
pub struct ClientHandle {
    outbound: mpsc::Sender<Utf8Bytes>,
    shutdown: Arc<Notify>,
}

impl ClientHandle {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        let (outbound, outbound_rx) = mpsc::channel(capacity);
        let handle = Self {
            outbound,
            shutdown: Arc::new(Notify::new()),
        };
        (handle, outbound_rx)
    }

    /// Queues one text frame without waiting.
    pub fn deliver(&self, frame: Utf8Bytes) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    pub fn close(&self) {
        self.shutdown.notify_one();
    }

    /// Signal the connection worker waits on.
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }
}

/// Registry entry for one live connection.
#[derive(Clone)]
pub struct ClientState {
    pub id: ClientId,
    pub handle: ClientHandle,
    pub subscription: Option<Channel>,
}

impl ClientState {
    pub fn new(id: ClientId, handle: ClientHandle) -> Self {
        Self {
            id,
            handle,
            subscription: None,
        }
    }
}

/// Point-in-time copy of one subscriber taken for a broadcast.
#[derive(Clone)]
pub struct Subscriber {
    pub id: ClientId,
    pub handle: ClientHandle,
}

/// Process-wide map of connected clients.
///
/// One readers/writer lock covers the map. It is held only for the map access itself, never
/// across persistence or socket I/O.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, ClientState>>,
    // Signalled whenever an entry is removed, for shutdown draining.
    drained: Notify,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection; an existing entry with the same id is replaced.
    pub async fn register(&self, state: ClientState) {
        let mut clients = self.clients.write().await;
        clients.insert(state.id, state);
    }

    /// Removes a connection and returns its entry if it was still registered.
    pub async fn deregister(&self, id: &ClientId) -> Option<ClientState> {
        let removed = {
            let mut clients = self.clients.write().await;
            clients.remove(id)
        };
        if removed.is_some() {
            self.drained.notify_waiters();
        }
        removed
    }

    /// Moves a connection to `channel`. Returns false when the id is no longer registered.
    pub async fn update_subscription(&self, id: &ClientId, channel: Channel) -> bool {
        let mut clients = self.clients.write().await;
        match clients.get_mut(id) {
            Some(state) => {
                state.subscription = Some(channel);
                true
            }
            None => false,
        }
    }

    /// Snapshot of every client currently subscribed to `channel`.
    pub async fn subscribers(&self, channel: &Channel) -> Vec<Subscriber> {
        let clients = self.clients.read().await;
        clients
            .values()
            .filter(|state| state.subscription.as_ref() == Some(channel))
            .map(|state| Subscriber {
                id: state.id,
                handle: state.handle.clone(),
            })
            .collect()
    }

    // Snapshot of every registered handle regardless of subscription.
    pub async fn all(&self) -> Vec<Subscriber> {
        let clients = self.clients.read().await;
        clients
            .values()
            .map(|state| Subscriber {
                id: state.id,
                handle: state.handle.clone(),
            })
            .collect()
    }

    pub async fn subscription_of(&self, id: &ClientId) -> Option<Channel> {
        let clients = self.clients.read().await;
        clients.get(id).and_then(|state| state.subscription)
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    /// Resolves once no connections remain registered.
    pub async fn wait_until_empty(&self) {
        loop {
            // Create the waiter before checking so a removal in between is not missed.
            let drained = self.drained.notified();
            if self.is_empty().await {
                return;
            }
            drained.await;
        }
    }
}
