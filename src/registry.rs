//! Registry of active client connections.
//!
//! Every connection task registers itself on accept and is removed when the
//! task ends, whichever way it ends. The registry is shared through an `Arc`
//! and serializes all access behind a single mutex; contention is one lock
//! per connect/disconnect.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{info, trace};

/// Process-local identity of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A registered client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub connected_at: Instant,
}

/// Thread-safe set of active connections, keyed by identity.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Connection>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Allocate a fresh identity for a newly accepted peer.
    ///
    /// The connection is not registered until [`add`](Self::add) or
    /// [`register`](Self::register) is called.
    pub fn connection(&self, peer: SocketAddr) -> Connection {
        Connection {
            id: ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            peer,
            connected_at: Instant::now(),
        }
    }

    // A task that panicked while holding the lock must not prevent other
    // connections from deregistering.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a connection. Returns false if it was already present.
    pub fn add(&self, connection: Connection) -> bool {
        let mut connections = self.lock();
        if connections.contains_key(&connection.id) {
            return false;
        }
        connections.insert(connection.id, connection);
        true
    }

    /// Remove a connection. Safe to call more than once.
    pub fn remove(&self, id: ConnectionId) -> Option<Connection> {
        self.lock().remove(&id)
    }

    /// Point-in-time copy of the active connections
    pub fn snapshot(&self) -> Vec<Connection> {
        self.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Add a connection and return a guard that removes it on drop.
    pub fn register(self: &Arc<Self>, connection: Connection) -> RegistryGuard {
        let id = connection.id;
        info!(conn = %id, peer = %connection.peer, "Adding connection");
        self.add(connection);
        RegistryGuard {
            registry: Arc::clone(self),
            id,
        }
    }
}

/// Deregisters its connection when dropped.
///
/// Runs on every exit path of the owning task, including errors and panics.
#[derive(Debug)]
pub struct RegistryGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl RegistryGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        match self.registry.remove(self.id) {
            Some(connection) => info!(
                conn = %self.id,
                peer = %connection.peer,
                duration_ms = connection.connected_at.elapsed().as_millis() as u64,
                "Removing connection"
            ),
            None => trace!(conn = %self.id, "Connection already removed"),
        }
    }
}
