//! Readiness Fan-In
//!
//! A [`Selector`] lets one thread wait until *any* of many channel
//! endpoints has something to receive (or has been closed), the way
//! `select(2)` waits on many sockets.
//!
//! Endpoints are attached with [`Endpoint::watch`]. Every push and close on
//! a watched endpoint bumps the selector's generation counter and wakes it.
//! [`Selector::select`] is level-triggered: it scans the endpoints it was
//! given and only sleeps when nothing is ready *and* the generation has not
//! moved since the scan started, so a wake-up between scan and sleep is
//! never lost.
//!
//! The set of endpoints is fixed per call. When that set grows, the owner
//! calls [`Selector::interrupt`] so a blocked `select` returns and the
//! caller can rescan with the new set.

use crate::connection::channel::Endpoint;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct SelectorState {
    generation: u64,
    interrupted: bool,
    closed: bool,
}

/// Wakes a waiting thread when any watched endpoint becomes ready.
#[derive(Debug, Default)]
pub struct Selector {
    state: Mutex<SelectorState>,
    changed: Condvar,
}

impl Selector {
    /// Creates a selector with nothing watching it yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that some watched endpoint changed and wakes all waiters.
    pub fn notify(&self) {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        drop(state);
        self.changed.notify_all();
    }

    /// Makes the current or next `select` return early, empty, once it
    /// finds nothing ready among the endpoints it was given.
    pub fn interrupt(&self) {
        self.state.lock().interrupted = true;
        self.changed.notify_all();
    }

    /// Stops all current and future waits: `select` returns immediately.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.changed.notify_all();
    }

    /// Returns the endpoints in `endpoints` that have a message pending or
    /// are closed, waiting up to `timeout` (or forever with `None`) for at
    /// least one to become ready.
    ///
    /// An empty result means the wait timed out, was interrupted, or the
    /// selector was closed.
    pub fn select<Tx, Rx>(
        &self,
        endpoints: &[Endpoint<Tx, Rx>],
        timeout: Option<Duration>,
    ) -> Vec<Endpoint<Tx, Rx>> {
        // An unrepresentable deadline means no deadline.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        loop {
            let seen = {
                let state = self.state.lock();
                if state.closed {
                    return Vec::new();
                }
                state.generation
            };

            let ready: Vec<Endpoint<Tx, Rx>> = endpoints
                .iter()
                .filter(|endpoint| endpoint.is_ready())
                .cloned()
                .collect();
            if !ready.is_empty() {
                return ready;
            }

            let mut state = self.state.lock();
            if state.closed {
                return Vec::new();
            }
            if state.interrupted {
                state.interrupted = false;
                return Vec::new();
            }
            if state.generation != seen {
                continue;
            }
            match deadline {
                None => self.changed.wait(&mut state),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Vec::new();
                    }
                    self.changed.wait_until(&mut state, deadline);
                }
            }
        }
    }
}
