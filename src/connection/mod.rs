//! Connection Module
//!
//! This module provides the in-process transport between callers and the
//! server's owner thread. There are no sockets: a "connection" is a pair of
//! message queues, and the owner thread multiplexes across all of them the
//! way a single-threaded event loop multiplexes sockets.
//!
//! ## Architecture
//!
//! ```text
//!  caller thread              caller thread
//!  ┌──────────┐               ┌──────────┐
//!  │ Endpoint │               │ Endpoint │
//!  └────┬─────┘               └────┬─────┘
//!       │ channel                  │ channel
//!  ┌────▼─────┐               ┌────▼─────┐
//!  │ Endpoint │──watch──┐ ┌───│ Endpoint │
//!  └──────────┘         │ │   └──────────┘
//!    (in ConnectionRegistry)
//!                       ▼ ▼
//!                   ┌──────────┐
//!                   │ Selector │ ── wakes ──> owner thread
//!                   └──────────┘
//! ```
//!
//! ## Features
//!
//! - **FIFO per direction**: messages arrive in send order
//! - **Shared close**: closing either end closes both, and wakes blocked receivers
//! - **Timeouts**: blocking, timed and non-blocking receives
//! - **Fan-in readiness**: one thread waits on many channels at once
//!
//! ## Example
//!
//! ```
//! use solokv::connection::{channel, ConnectionRegistry, Selector};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let selector = Arc::new(Selector::new());
//! let registry = ConnectionRegistry::new();
//!
//! let (client, server_end) = channel::pair::<&str, &str>();
//! server_end.watch(Arc::clone(&selector));
//! registry.add(server_end);
//!
//! client.send("hello").unwrap();
//! let ready = selector.select(&registry.snapshot(), Some(Duration::from_secs(1)));
//! assert_eq!(ready[0].try_recv().unwrap(), "hello");
//! ```

pub mod channel;
pub mod registry;
pub mod select;

// Re-export commonly used types
pub use channel::{ChannelError, ConnectionId, Endpoint};
pub use registry::ConnectionRegistry;
pub use select::Selector;
