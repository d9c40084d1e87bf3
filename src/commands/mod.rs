//! Command Module
//!
//! This module is the message layer between callers and the store: the
//! typed requests and responses that travel over a connection, and the
//! handler that executes them on the owner thread.
//!
//! ## Architecture
//!
//! ```text
//! Client method / Command::parse(name, args)
//!       │
//!       ▼
//! ┌─────────────────┐
//! │    Request      │  Call(Command) | Get(Attribute) | Set(AttributeValue)
//! └────────┬────────┘
//!          │  channel
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (owner thread)
//! │                 │
//! │  - Dispatch     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Store       │  (storage module)
//! └─────────────────┘
//!          │
//!          ▼
//!   Response: Return(Reply) | Error(StoreError)
//! ```
//!
//! ## Supported Operations
//!
//! ### Values
//! - `get`, `set`, `setnx`
//! - `mget`, `mset`, `msetnx`
//! - `incr`, `decr`
//!
//! ### Keys
//! - `delete`, `exists`, `keys`
//! - `ttl`, `pttl`, `expire`, `persist`
//! - `flushdb`
//!
//! ### Attributes
//! - `empty`, `len`, `stats` (read-only)
//! - `default_ttl` (read/write)

pub mod handler;
pub mod request;

// Re-export the main command types
pub use handler::CommandHandler;
pub use request::{Attribute, AttributeValue, Command, ParseError, Reply, Request, Response};
