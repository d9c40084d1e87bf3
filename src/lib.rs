//! # SoloKV - A Single-Owner In-Process Key-Value Store
//!
//! SoloKV is a small Redis-like cache that lives inside your process. One
//! dedicated thread owns the store and executes every operation; any number
//! of caller threads talk to it over in-process connections, so the data
//! path needs no locks at all.
//!
//! ## Features
//!
//! - **Single Owner**: all mutation is serialized through one thread
//! - **TTL Support**: per-key expiry, plus an optional store-wide default
//! - **Lazy + Active Expiry**: reads drop expired keys, and an adaptive
//!   sampling cycle reclaims the ones nobody reads
//! - **Many Callers**: paired-queue connections multiplexed by a selector
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               SoloKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐   channel   ┌───────────────────────────────────────┐  │
//! │  │   Client    │────────────>│            Owner Thread               │  │
//! │  └─────────────┘             │                                       │  │
//! │  ┌─────────────┐   channel   │  ConnectionRegistry + Selector        │  │
//! │  │   Client    │────────────>│            │                          │  │
//! │  └─────────────┘             │            ▼                          │  │
//! │                              │  CommandHandler ──> Store             │  │
//! │                              │                       ▲               │  │
//! │                              │  ExpirySweeper ───────┘               │  │
//! │                              └───────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use solokv::{Client, Server, ServerConfig, Value};
//! use std::time::Duration;
//!
//! let server = Server::new(ServerConfig::default()).unwrap();
//! let mut client = Client::connect(&server).unwrap();
//!
//! client.set("name", "Ariz", None).unwrap();
//! client.set("session", "abc123", Some(Duration::from_secs(60))).unwrap();
//!
//! assert_eq!(client.get("name").unwrap(), Some(Value::from("Ariz")));
//! assert_eq!(client.ttl("name").unwrap(), -1);
//! assert!(client.ttl("session").unwrap() > 0);
//!
//! server.stop();
//! server.join().unwrap();
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the store, its values and the active expiry cycle
//! - [`connection`]: channels, the connection registry and the selector
//! - [`commands`]: typed requests and responses, and their dispatcher
//! - [`server`]: the owner thread and its lifecycle
//! - [`client`]: a blocking, typed wrapper over one connection
//!
//! ## Design Highlights
//!
//! ### No Locks on the Data Path
//!
//! The [`Store`] takes `&mut self` for every operation and is moved onto
//! the owner thread when the server starts. Locks exist only in the
//! transport: each channel queue, the registry and the selector.
//!
//! ### Adaptive Active Expiry
//!
//! Every pass of the owner loop gives the [`ExpirySweeper`] a chance to
//! run. It samples keys that carry a deadline, removes the expired ones, and
//! keeps a smoothed estimate of how stale the keyspace is so that it only
//! spends time when there is something to reclaim.

pub mod client;
pub mod commands;
pub mod connection;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{Client, ClientError};
pub use commands::{Command, CommandHandler, Reply, Request, Response};
pub use connection::{ChannelError, Endpoint};
pub use server::{Server, ServerConfig, ServerError};
pub use storage::{ExpiryConfig, ExpirySweeper, Store, StoreError, Value};

/// Version of SoloKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
