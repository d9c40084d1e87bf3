//! Storage Engine Module
//!
//! This module provides the core storage functionality for SoloKV: a
//! single-owner key-value table with TTL support and the adaptive active
//! expiry cycle that runs alongside it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │   table: key -> Entry { Value, expires_at }                 │
//! │   expiring: keys with a deadline                            │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ samples `expiring`
//!              ┌─────────────┴─────────────┐
//!              │      ExpirySweeper        │
//!              │ (step of the owner loop)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Single Owner**: `&mut self` everywhere, no locks on the data path
//! - **TTL Support**: Keys can have time-to-live expiry
//! - **Lazy Expiry**: Expired keys are cleaned on access
//! - **Active Expiry**: Random sampling reclaims keys nobody reads
//!
//! ## Example
//!
//! ```
//! use solokv::storage::{ExpirySweeper, Store, Value};
//! use std::time::Duration;
//!
//! let mut store = Store::new();
//! let mut sweeper = ExpirySweeper::default();
//!
//! store.set("name", "Ariz", None).unwrap();
//! store.set("session", "token123", Some(Duration::from_secs(3600))).unwrap();
//! assert_eq!(store.get("name"), Some(Value::from("Ariz")));
//!
//! // Nothing has expired yet, so the cycle leaves both keys alone.
//! sweeper.run_cycle(&mut store);
//! assert_eq!(store.len(), 2);
//! ```

pub mod engine;
pub mod expiry;
pub mod value;

// Re-export commonly used types
pub use engine::{Store, StoreError, StoreStats};
pub use expiry::{CycleStats, ExpiryConfig, ExpirySweeper};
pub use value::{Entry, Value, MAX_TTL};
