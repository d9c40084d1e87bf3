//! Connection Registry
//!
//! The set of live server-side endpoints. Callers add to it from any
//! thread when they open a connection; the owner loop removes closed ones
//! and blocks on [`ConnectionRegistry::wait`] while it is empty.

use crate::connection::channel::{ConnectionId, Endpoint};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct RegistryState<Tx, Rx> {
    connections: HashMap<ConnectionId, Endpoint<Tx, Rx>>,
    closed: bool,
}

/// A thread-safe set of endpoints with a blocking "wait until non-empty".
pub struct ConnectionRegistry<Tx, Rx> {
    state: Mutex<RegistryState<Tx, Rx>>,
    not_empty: Condvar,
}

impl<Tx, Rx> Default for ConnectionRegistry<Tx, Rx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tx, Rx> std::fmt::Debug for ConnectionRegistry<Tx, Rx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ConnectionRegistry")
            .field("connections", &state.connections.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<Tx, Rx> ConnectionRegistry<Tx, Rx> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                connections: HashMap::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Adds an endpoint and releases anyone blocked in [`wait`](Self::wait).
    pub fn add(&self, endpoint: Endpoint<Tx, Rx>) {
        self.state.lock().connections.insert(endpoint.id(), endpoint);
        self.not_empty.notify_all();
    }

    /// Removes an endpoint. Removing an unknown id is a no-op.
    pub fn remove(&self, id: ConnectionId) -> Option<Endpoint<Tx, Rx>> {
        self.state.lock().connections.remove(&id)
    }

    /// Blocks until the registry is non-empty, `timeout` elapses, or the
    /// registry is closed. `None`, or a timeout too large to represent,
    /// waits without a time limit.
    ///
    /// Returns whether the registry is non-empty.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.state.lock();

        while state.connections.is_empty() && !state.closed {
            match deadline {
                None => self.not_empty.wait(&mut state),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    self.not_empty.wait_until(&mut state, deadline);
                }
            }
        }
        !state.connections.is_empty()
    }

    /// Releases every current and future [`wait`](Self::wait) call.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Non-blocking emptiness check.
    pub fn is_empty(&self) -> bool {
        self.state.lock().connections.is_empty()
    }

    /// A copy of the current endpoints, for selecting over without holding the lock.
    pub fn snapshot(&self) -> Vec<Endpoint<Tx, Rx>> {
        self.state.lock().connections.values().cloned().collect()
    }

    /// Removes and returns every endpoint.
    pub fn drain(&self) -> Vec<Endpoint<Tx, Rx>> {
        self.state
            .lock()
            .connections
            .drain()
            .map(|(_, endpoint)| endpoint)
            .collect()
    }
}
