//! Paired-Queue Channels
//!
//! A channel is a bidirectional, closeable transport of discrete messages
//! between exactly two endpoints. It stands in for a client socket: the
//! caller keeps one end, the server registers the other.
//!
//! ## Layout
//!
//! ```text
//!   Endpoint<A, B>                               Endpoint<B, A>
//!  ┌──────────────┐   outbound ── Queue<A> ──>  ┌──────────────┐
//!  │   (caller)   │                             │   (server)   │
//!  │              │  <── Queue<B> ── outbound   │              │
//!  └──────────────┘                             └──────────────┘
//! ```
//!
//! Each queue has its own lock and condition variable, and its own copy of
//! the `closed` flag. Closing takes both queue locks (in address order) and
//! flips both flags together, so a `send` or `recv` can never slip past a
//! close: the flag is always checked under the same lock that guards the
//! items. Closed is terminal.
//!
//! A queue can carry a [`Selector`]; every push and every close notifies
//! it, which is how the server waits on many channels at once.

use crate::connection::select::Selector;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a channel. Both endpoints of a pair share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Errors returned by channel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Either endpoint closed the channel
    #[error("channel closed")]
    Closed,

    /// `recv_timeout` ran out of time with nothing to receive
    #[error("timed out waiting for a message")]
    Timeout,

    /// `try_recv` found nothing queued
    #[error("no message pending")]
    Empty,
}

/// How long a receive may block.
#[derive(Debug, Clone, Copy)]
enum Wait {
    NonBlocking,
    Forever,
    Until(Instant),
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
    watcher: Option<Arc<Selector>>,
}

/// One direction of a channel.
struct Queue<T> {
    state: Mutex<QueueState<T>>,
    ready: Condvar,
}

impl<T> Queue<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
                watcher: None,
            }),
            ready: Condvar::new(),
        }
    }

    fn push(&self, item: T) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ChannelError::Closed);
        }
        state.items.push_back(item);
        let watcher = state.watcher.clone();
        drop(state);

        self.ready.notify_one();
        if let Some(selector) = watcher {
            selector.notify();
        }
        Ok(())
    }

    fn pop(&self, wait: Wait) -> Result<T, ChannelError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(ChannelError::Closed);
            }
            if let Some(item) = state.items.pop_front() {
                return Ok(item);
            }
            match wait {
                Wait::NonBlocking => return Err(ChannelError::Empty),
                Wait::Forever => self.ready.wait(&mut state),
                Wait::Until(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(ChannelError::Timeout);
                    }
                    self.ready.wait_until(&mut state, deadline);
                }
            }
        }
    }

    /// Marks a queue closed while its lock is held; returns its watcher.
    fn mark_closed(state: &mut MutexGuard<'_, QueueState<T>>) -> Option<Arc<Selector>> {
        state.closed = true;
        state.watcher.clone()
    }

    fn wake(&self, watcher: Option<Arc<Selector>>) {
        self.ready.notify_all();
        if let Some(selector) = watcher {
            selector.notify();
        }
    }
}

/// One end of a channel: sends `Tx` messages and receives `Rx` messages.
///
/// Cloning an endpoint yields another handle to the same end.
pub struct Endpoint<Tx, Rx> {
    id: ConnectionId,
    outbound: Arc<Queue<Tx>>,
    inbound: Arc<Queue<Rx>>,
}

impl<Tx, Rx> Clone for Endpoint<Tx, Rx> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            outbound: Arc::clone(&self.outbound),
            inbound: Arc::clone(&self.inbound),
        }
    }
}

impl<Tx, Rx> fmt::Debug for Endpoint<Tx, Rx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("pending", &self.inbound.state.lock().items.len())
            .finish()
    }
}

/// Opens a channel and returns its two ends.
///
/// # Example
///
/// ```
/// use solokv::connection::{channel, ChannelError};
///
/// let (left, right) = channel::pair::<&str, u32>();
///
/// left.send("ping").unwrap();
/// assert_eq!(right.recv().unwrap(), "ping");
///
/// right.send(42).unwrap();
/// assert_eq!(left.recv().unwrap(), 42);
///
/// right.close();
/// assert_eq!(left.send("late"), Err(ChannelError::Closed));
/// ```
pub fn pair<A, B>() -> (Endpoint<A, B>, Endpoint<B, A>) {
    let id = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    let a_to_b = Arc::new(Queue::new());
    let b_to_a = Arc::new(Queue::new());

    let left = Endpoint {
        id,
        outbound: Arc::clone(&a_to_b),
        inbound: Arc::clone(&b_to_a),
    };
    let right = Endpoint {
        id,
        outbound: b_to_a,
        inbound: a_to_b,
    };
    (left, right)
}

impl<Tx, Rx> Endpoint<Tx, Rx> {
    /// The channel's identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends a message to the other end.
    ///
    /// Fails with [`ChannelError::Closed`] once either end has closed.
    pub fn send(&self, message: Tx) -> Result<(), ChannelError> {
        self.outbound.push(message)
    }

    /// Blocks until a message arrives or the channel closes.
    pub fn recv(&self) -> Result<Rx, ChannelError> {
        self.inbound.pop(Wait::Forever)
    }

    /// Like [`recv`](Self::recv), but gives up with
    /// [`ChannelError::Timeout`] after `timeout`.
    ///
    /// A timeout too large to represent as a deadline waits forever.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Rx, ChannelError> {
        let wait = match Instant::now().checked_add(timeout) {
            Some(deadline) => Wait::Until(deadline),
            None => Wait::Forever,
        };
        self.inbound.pop(wait)
    }

    /// Returns a queued message without blocking.
    pub fn try_recv(&self) -> Result<Rx, ChannelError> {
        self.inbound.pop(Wait::NonBlocking)
    }

    /// Closes the channel for both ends. Idempotent.
    ///
    /// Any receiver blocked on either end wakes up with
    /// [`ChannelError::Closed`].
    pub fn close(&self) {
        let out_addr = Arc::as_ptr(&self.outbound) as *const () as usize;
        let in_addr = Arc::as_ptr(&self.inbound) as *const () as usize;

        let (out_watcher, in_watcher) = if out_addr < in_addr {
            let mut out_state = self.outbound.state.lock();
            let mut in_state = self.inbound.state.lock();
            if out_state.closed {
                return;
            }
            (
                Queue::mark_closed(&mut out_state),
                Queue::mark_closed(&mut in_state),
            )
        } else {
            let mut in_state = self.inbound.state.lock();
            let mut out_state = self.outbound.state.lock();
            if out_state.closed {
                return;
            }
            (
                Queue::mark_closed(&mut out_state),
                Queue::mark_closed(&mut in_state),
            )
        };

        self.outbound.wake(out_watcher);
        self.inbound.wake(in_watcher);
    }

    /// Whether the channel has been closed by either end.
    pub fn is_closed(&self) -> bool {
        self.outbound.state.lock().closed
    }

    /// Whether a message is waiting to be received.
    pub fn has_pending(&self) -> bool {
        !self.inbound.state.lock().items.is_empty()
    }

    /// Ready for a selector: something to receive, or closed.
    pub(crate) fn is_ready(&self) -> bool {
        let state = self.inbound.state.lock();
        state.closed || !state.items.is_empty()
    }

    /// Makes `selector` hear about every message arriving at this end, and
    /// about the channel closing.
    pub fn watch(&self, selector: Arc<Selector>) {
        let mut state = self.inbound.state.lock();
        let already_ready = state.closed || !state.items.is_empty();
        state.watcher = Some(Arc::clone(&selector));
        drop(state);

        if already_ready {
            selector.notify();
        }
    }
}
