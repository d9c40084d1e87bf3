//! Single-Owner Storage Engine with Expiry Support
//!
//! This module implements the keyed table at the heart of SoloKV. Unlike a
//! shared concurrent map, the [`Store`] is owned by exactly one thread (the
//! server's owner loop) and every operation takes `&mut self`, so there is
//! no locking at all on the data path.
//!
//! ## Expiry Bookkeeping
//!
//! ```text
//! ┌──────────────────────────────────────┐   ┌────────────────────────┐
//! │ table: HashMap<String, Entry>        │   │ expiring: HashSet      │
//! │   "a"  -> Entry { 1, never }         │   │                        │
//! │   "b"  -> Entry { "x", t+10s }  ─────┼──>│   "b"                  │
//! │   "c"  -> Entry { 7, t+1s }     ─────┼──>│   "c"                  │
//! └──────────────────────────────────────┘   └────────────────────────┘
//! ```
//!
//! Every key in `expiring` exists in `table` with a deadline, and every
//! entry with a deadline is in `expiring`. The active sweeper samples from
//! `expiring` only, so keys that can never expire cost it nothing.
//!
//! Expired keys are removed in two ways:
//! 1. **Lazy**: any read that finds a key past its deadline removes it
//! 2. **Active**: [`ExpirySweeper`](super::ExpirySweeper) samples and removes them

use crate::storage::value::{deadline_after, Entry, Value, MAX_TTL};
use rand::seq::IteratorRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Batch deletes remove keys one at a time while the table is more than
/// this many times larger than the batch; otherwise the table is rebuilt.
const REBUILD_FACTOR: usize = 10;

/// Precondition violations reported by store operations.
///
/// Absence is never an error: missing or expired keys show up as `None`,
/// `false` or `-2` depending on the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// INCR/DECR on a value that is not an integer
    #[error("value of type '{0}' does not support incr/decr")]
    NotAnInteger(&'static str),

    /// EXPIRE called with both NX and XX
    #[error("nx and xx are mutually exclusive")]
    ConflictingFlags,

    /// A TTL of zero or longer than [`MAX_TTL`] was supplied
    #[error("ttl must be greater than zero and at most 100 years")]
    InvalidTtl,

    /// INCR/DECR would leave the i64 range
    #[error("increment or decrement would overflow")]
    Overflow,
}

/// Store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Entries in the table, including expired ones not yet reclaimed
    pub keys: usize,
    /// Entries carrying an expiry
    pub expiring: usize,
    /// GET/MGET lookups that found a live value
    pub hits: u64,
    /// GET/MGET lookups that found nothing
    pub misses: u64,
    /// Writes performed
    pub sets: u64,
    /// Keys removed by DELETE
    pub deletes: u64,
    /// Keys reclaimed because they expired (lazy and active)
    pub expired: u64,
}

/// The keyed value table.
///
/// # Example
///
/// ```
/// use solokv::storage::{Store, Value};
/// use std::time::Duration;
///
/// let mut store = Store::new();
///
/// store.set("name", "Ariz", None).unwrap();
/// assert_eq!(store.get("name"), Some(Value::from("Ariz")));
///
/// store.set("session", "abc123", Some(Duration::from_secs(60))).unwrap();
/// assert!(store.ttl("session") > 0);
/// assert_eq!(store.ttl("missing"), -2);
/// ```
#[derive(Debug, Default)]
pub struct Store {
    table: HashMap<String, Entry>,
    expiring: HashSet<String>,
    default_ttl: Option<Duration>,
    next_seq: u64,
    counters: StoreStats,
}

fn check_ttl(ttl: Duration) -> Result<Duration, StoreError> {
    if ttl.is_zero() || ttl > MAX_TTL || deadline_after(ttl).is_none() {
        Err(StoreError::InvalidTtl)
    } else {
        Ok(ttl)
    }
}

impl Store {
    /// Creates an empty store whose keys never expire unless told to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that applies `default_ttl` to writes given no TTL.
    pub fn with_default_ttl(default_ttl: Option<Duration>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        store.set_default_ttl(default_ttl)?;
        Ok(store)
    }

    /// The TTL applied to writes that do not supply one.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Changes the default TTL. Only affects keys written afterwards.
    pub fn set_default_ttl(&mut self, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.default_ttl = ttl.map(check_ttl).transpose()?;
        Ok(())
    }

    fn resolve_ttl(&self, ttl: Option<Duration>) -> Result<Option<Duration>, StoreError> {
        ttl.or(self.default_ttl).map(check_ttl).transpose()
    }

    /// Writes an entry, keeping `expiring` in sync and the key's position
    /// in the insertion order if it already existed.
    fn insert(&mut self, key: String, value: Value, ttl: Option<Duration>) {
        let mut entry = Entry::new(value, ttl);
        entry.seq = match self.table.get(&key) {
            Some(old) => old.seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };

        if entry.has_expiry() {
            self.expiring.insert(key.clone());
        } else {
            self.expiring.remove(&key);
        }
        self.table.insert(key, entry);
        self.counters.sets += 1;
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        self.expiring.remove(key);
        self.table.remove(key).is_some()
    }

    /// Looks up a key, removing it first if it has expired.
    fn live_entry(&mut self, key: &str) -> Option<&mut Entry> {
        let expired = self.table.get(key)?.is_expired();
        if expired {
            self.remove_entry(key);
            self.counters.expired += 1;
            return None;
        }
        self.table.get_mut(key)
    }

    /// Removes a batch of keys, returning how many were present.
    ///
    /// Small batches against a large table are removed one by one; larger
    /// batches rebuild the table without them. The result is the same.
    fn delete_many<K: AsRef<str>>(&mut self, keys: &[K]) -> usize {
        if keys.is_empty() {
            return 0;
        }

        if self.table.len() > keys.len() * REBUILD_FACTOR {
            keys.iter().filter(|k| self.remove_entry(k.as_ref())).count()
        } else {
            let doomed: HashSet<&str> = keys.iter().map(|k| k.as_ref()).collect();
            let before = self.table.len();
            self.table.retain(|k, _| !doomed.contains(k.as_str()));
            self.expiring.retain(|k| !doomed.contains(k.as_str()));
            before - self.table.len()
        }
    }

    /// Batch-removes keys found expired during a scan.
    fn purge(&mut self, expired: &[String]) {
        let removed = self.delete_many(expired);
        self.counters.expired += removed as u64;
    }

    // ========================================================================
    // STRING OPERATIONS
    // ========================================================================

    /// Sets a key to a value, replacing any previous entry.
    ///
    /// With `ttl` (or a default TTL) the key expires after that long;
    /// otherwise it lives until deleted. Always returns `Ok(true)` for a
    /// valid TTL.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let ttl = self.resolve_ttl(ttl)?;
        self.insert(key.into(), value.into(), ttl);
        Ok(true)
    }

    /// Sets a key only if it is absent or expired.
    ///
    /// Returns whether the write happened.
    pub fn setnx(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let key = key.into();
        let ttl = self.resolve_ttl(ttl)?;
        if self.live_entry(&key).is_some() {
            return Ok(false);
        }
        self.insert(key, value.into(), ttl);
        Ok(true)
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        match self.live_entry(key).map(|e| e.value.clone()) {
            Some(value) => {
                self.counters.hits += 1;
                Some(value)
            }
            None => {
                self.counters.misses += 1;
                None
            }
        }
    }

    /// Gets several keys at once.
    ///
    /// The result lines up with `keys`; missing or expired keys give `None`.
    /// Expired keys discovered along the way are removed in one batch.
    pub fn mget<K: AsRef<str>>(&mut self, keys: &[K]) -> Vec<Option<Value>> {
        let now = Instant::now();
        let mut expired = Vec::new();

        let values: Vec<Option<Value>> = keys
            .iter()
            .map(|key| match self.table.get(key.as_ref()) {
                Some(entry) if entry.is_expired_at(now) => {
                    expired.push(key.as_ref().to_string());
                    None
                }
                Some(entry) => Some(entry.value.clone()),
                None => None,
            })
            .collect();

        let hits = values.iter().filter(|v| v.is_some()).count() as u64;
        self.counters.hits += hits;
        self.counters.misses += values.len() as u64 - hits;
        self.purge(&expired);
        values
    }

    /// Sets several keys at once, all with the same TTL.
    pub fn mset<I, K, V>(&mut self, data: I, ttl: Option<Duration>) -> Result<bool, StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let ttl = self.resolve_ttl(ttl)?;
        for (key, value) in data {
            self.insert(key.into(), value.into(), ttl);
        }
        Ok(true)
    }

    /// Sets the keys of `data` that are absent or expired.
    ///
    /// Keys that already hold a live value are left alone (this is not
    /// all-or-nothing). Returns how many keys were written.
    pub fn msetnx<I, K, V>(&mut self, data: I, ttl: Option<Duration>) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let ttl = self.resolve_ttl(ttl)?;
        let mut written = 0;
        for (key, value) in data {
            let key = key.into();
            if self.live_entry(&key).is_none() {
                self.insert(key, value.into(), ttl);
                written += 1;
            }
        }
        Ok(written)
    }

    /// Deletes keys, returning how many existed.
    pub fn delete<K: AsRef<str>>(&mut self, keys: &[K]) -> usize {
        let removed = self.delete_many(keys);
        self.counters.deletes += removed as u64;
        removed
    }

    /// Checks if a key exists (and is not expired).
    pub fn exists(&mut self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    /// Returns every live key in insertion order.
    ///
    /// Keys found expired during the scan are removed in one batch.
    pub fn keys(&mut self) -> Vec<String> {
        let now = Instant::now();
        let mut live = Vec::with_capacity(self.table.len());
        let mut expired = Vec::new();

        for (key, entry) in &self.table {
            if entry.is_expired_at(now) {
                expired.push(key.clone());
            } else {
                live.push((entry.seq, key.clone()));
            }
        }

        self.purge(&expired);
        live.sort_unstable_by_key(|(seq, _)| *seq);
        live.into_iter().map(|(_, key)| key).collect()
    }

    /// Gets the remaining TTL for a key in seconds.
    ///
    /// # Returns
    ///
    /// - `-2` if the key doesn't exist or has expired
    /// - `-1` if the key exists but has no expiry
    /// - the remaining whole seconds otherwise (rounded down)
    pub fn ttl(&mut self, key: &str) -> i64 {
        match self.live_entry(key) {
            None => -2,
            Some(entry) => entry
                .remaining()
                .map(|left| left.as_secs() as i64)
                .unwrap_or(-1),
        }
    }

    /// Gets the remaining TTL for a key in milliseconds.
    pub fn pttl(&mut self, key: &str) -> i64 {
        match self.live_entry(key) {
            None => -2,
            Some(entry) => entry
                .remaining()
                .map(|left| left.as_millis() as i64)
                .unwrap_or(-1),
        }
    }

    /// Increments an integer value, creating the key at 0 first if needed.
    ///
    /// If the key exists and `ttl` is given, its expiry is reset to `ttl`
    /// (the value is kept) before incrementing. Fails without touching the
    /// key if it holds something other than an integer.
    pub fn incr(&mut self, key: &str, amount: i64, ttl: Option<Duration>) -> Result<i64, StoreError> {
        let explicit = ttl.map(check_ttl).transpose()?;

        let Some(entry) = self.live_entry(key) else {
            let ttl = self.resolve_ttl(explicit)?;
            self.insert(key.to_string(), Value::Int(amount), ttl);
            return Ok(amount);
        };

        let next = entry.increment(amount)?;
        if let Some(ttl) = explicit {
            entry.expires_at = deadline_after(ttl);
            self.expiring.insert(key.to_string());
        }
        Ok(next)
    }

    /// Decrements an integer value. Same rules as [`Store::incr`].
    pub fn decr(&mut self, key: &str, amount: i64, ttl: Option<Duration>) -> Result<i64, StoreError> {
        let amount = amount.checked_neg().ok_or(StoreError::Overflow)?;
        self.incr(key, amount, ttl)
    }

    /// Sets an expiry time on an existing key.
    ///
    /// With `nx` the key must not already expire; with `xx` it must. The
    /// two flags are mutually exclusive.
    ///
    /// # Returns
    ///
    /// Returns `true` if the expiry was set, `false` if the key doesn't exist
    /// or the `nx`/`xx` condition did not hold.
    pub fn expire(&mut self, key: &str, ttl: Duration, nx: bool, xx: bool) -> Result<bool, StoreError> {
        if nx && xx {
            return Err(StoreError::ConflictingFlags);
        }
        let ttl = check_ttl(ttl)?;

        let Some(entry) = self.live_entry(key) else {
            return Ok(false);
        };
        if (nx && entry.has_expiry()) || (xx && !entry.has_expiry()) {
            return Ok(false);
        }

        entry.expires_at = deadline_after(ttl);
        self.expiring.insert(key.to_string());
        Ok(true)
    }

    /// Removes the expiry from a key (makes it persistent).
    ///
    /// Returns `true` only if the key existed and had an expiry.
    pub fn persist(&mut self, key: &str) -> bool {
        let Some(entry) = self.live_entry(key) else {
            return false;
        };
        if entry.expires_at.take().is_none() {
            return false;
        }
        self.expiring.remove(key);
        true
    }

    /// Clears all data from the store.
    pub fn flushdb(&mut self) {
        self.table.clear();
        self.expiring.clear();
    }

    /// Returns true if the table has no entries.
    ///
    /// Expired entries that have not been reclaimed yet still count.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of entries in the table, without triggering lazy expiry.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keys: self.table.len(),
            expiring: self.expiring.len(),
            ..self.counters
        }
    }

    // ========================================================================
    // ACTIVE EXPIRY HOOKS
    // ========================================================================

    /// Number of keys that carry an expiry.
    pub(crate) fn expiring_len(&self) -> usize {
        self.expiring.len()
    }

    /// Picks up to `count` distinct keys from the expiring set at random.
    pub(crate) fn sample_expiring<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<String> {
        self.expiring
            .iter()
            .choose_multiple(rng, count)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Removes `key` if it has expired by `now`. Returns whether it was removed.
    pub(crate) fn expire_if_due(&mut self, key: &str, now: Instant) -> bool {
        let expired = match self.table.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.expiring.remove(key);
                return false;
            }
        };
        if expired {
            self.remove_entry(key);
            self.counters.expired += 1;
        }
        expired
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for key in &self.expiring {
            let entry = self.table.get(key).expect("expiring key missing from table");
            assert!(entry.has_expiry(), "expiring key {key} has no deadline");
        }
        for (key, entry) in &self.table {
            assert_eq!(entry.has_expiry(), self.expiring.contains(key), "key {key}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const SHORT: Duration = Duration::from_millis(30);

    fn wait_out(ttl: Duration) {
        thread::sleep(ttl + Duration::from_millis(30));
    }

    #[test]
    fn test_set_and_get() {
        let mut store = Store::new();

        assert_eq!(store.set("key", "value", None), Ok(true));
        assert_eq!(store.get("key"), Some(Value::from("value")));
        store.assert_consistent();
    }

    #[test]
    fn test_get_nonexistent() {
        let mut store = Store::new();
        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_set_overwrites_and_clears_expiry() {
        let mut store = Store::new();

        store.set("key", 1, Some(Duration::from_secs(60))).unwrap();
        assert_eq!(store.stats().expiring, 1);

        store.set("key", 2, None).unwrap();
        assert_eq!(store.get("key"), Some(Value::Int(2)));
        assert_eq!(store.ttl("key"), -1);
        store.assert_consistent();
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut store = Store::new();
        assert_eq!(store.set("key", 1, Some(Duration::ZERO)), Err(StoreError::InvalidTtl));
        assert!(store.is_empty());
    }

    #[test]
    fn test_ttl_past_clock_range_rejected() {
        let huge = Duration::from_secs(u64::MAX / 2);
        let mut store = Store::new();

        assert_eq!(store.set("key", 1, Some(huge)), Err(StoreError::InvalidTtl));
        let over = MAX_TTL + Duration::from_secs(1);
        assert_eq!(store.set("key", 1, Some(over)), Err(StoreError::InvalidTtl));
        assert!(store.is_empty());

        store.set("key", 1, Some(Duration::from_secs(60))).unwrap();
        assert_eq!(store.expire("key", huge, false, false), Err(StoreError::InvalidTtl));
        assert_eq!(store.incr("key", 1, Some(huge)), Err(StoreError::InvalidTtl));
        assert_eq!(store.get("key"), Some(Value::Int(1)));
        assert!((59..=60).contains(&store.ttl("key")));

        assert_eq!(store.set_default_ttl(Some(huge)), Err(StoreError::InvalidTtl));
        assert_eq!(store.default_ttl(), None);

        assert_eq!(store.set("long", 1, Some(MAX_TTL)), Ok(true));
        assert!(store.ttl("long") > 0);
        store.assert_consistent();
    }

    #[test]
    fn test_expiry() {
        let mut store = Store::new();

        store.set("key", "value", Some(SHORT)).unwrap();
        assert!(store.exists("key"));

        wait_out(SHORT);

        assert_eq!(store.get("key"), None);
        assert_eq!(store.ttl("key"), -2);
        assert!(store.is_empty());
        store.assert_consistent();
    }

    #[test]
    fn test_ttl_values() {
        let mut store = Store::new();

        store.set("forever", 1, None).unwrap();
        store.set("later", 1, Some(Duration::from_secs(100))).unwrap();

        assert_eq!(store.ttl("forever"), -1);
        assert_eq!(store.ttl("missing"), -2);
        let ttl = store.ttl("later");
        assert!((99..=100).contains(&ttl), "ttl was {ttl}");
        assert!(store.pttl("later") > 99_000);
    }

    #[test]
    fn test_setnx() {
        let mut store = Store::new();

        assert_eq!(store.setnx("key", "first", None), Ok(true));
        assert_eq!(store.setnx("key", "second", None), Ok(false));
        assert_eq!(store.get("key"), Some(Value::from("first")));
    }

    #[test]
    fn test_setnx_on_expired_key() {
        let mut store = Store::new();

        store.set("key", "old", Some(SHORT)).unwrap();
        wait_out(SHORT);

        assert_eq!(store.setnx("key", "new", None), Ok(true));
        assert_eq!(store.get("key"), Some(Value::from("new")));
        assert_eq!(store.ttl("key"), -1);
        store.assert_consistent();
    }

    #[test]
    fn test_mget_aligns_with_keys() {
        let mut store = Store::new();

        store.set("a", 1, None).unwrap();
        store.set("gone", 2, Some(SHORT)).unwrap();
        store.set("c", 3, None).unwrap();
        wait_out(SHORT);

        let values = store.mget(&["a", "missing", "gone", "c"]);
        assert_eq!(values, vec![Some(Value::Int(1)), None, None, Some(Value::Int(3))]);
        assert_eq!(store.len(), 2);
        store.assert_consistent();
    }

    #[test]
    fn test_mset() {
        let mut store = Store::new();

        let ttl = Some(Duration::from_secs(10));
        assert_eq!(store.mset([("a", 1), ("b", 2)], ttl), Ok(true));
        assert_eq!(store.get("a"), Some(Value::Int(1)));
        assert!(store.ttl("b") >= 9);
        store.assert_consistent();
    }

    #[test]
    fn test_msetnx_skips_present_keys() {
        let mut store = Store::new();

        store.set("a", "old", None).unwrap();
        let written = store
            .msetnx([("a", "new"), ("b", "new"), ("c", "new")], None)
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.get("a"), Some(Value::from("old")));
        assert_eq!(store.get("b"), Some(Value::from("new")));
        assert_eq!(store.get("c"), Some(Value::from("new")));
    }

    #[test]
    fn test_delete() {
        let mut store = Store::new();

        store.set("a", 1, None).unwrap();
        store.set("b", 2, Some(Duration::from_secs(10))).unwrap();

        assert_eq!(store.delete(&["a", "b", "missing"]), 2);
        assert_eq!(store.delete(&["a", "b"]), 0);
        assert!(store.is_empty());
        store.assert_consistent();
    }

    #[test]
    fn test_delete_policies_agree() {
        // One-by-one path: table much larger than the batch.
        let mut big = Store::new();
        for i in 0..100 {
            big.set(format!("key:{i}"), i, Some(Duration::from_secs(60))).unwrap();
        }
        assert_eq!(big.delete(&["key:1", "key:2", "key:2", "nope"]), 2);
        assert_eq!(big.len(), 98);
        big.assert_consistent();

        // Rebuild path: batch comparable to the table.
        let mut small = Store::new();
        for i in 0..5 {
            small.set(format!("key:{i}"), i, Some(Duration::from_secs(60))).unwrap();
        }
        assert_eq!(small.delete(&["key:1", "key:2", "key:2", "nope"]), 2);
        assert_eq!(small.len(), 3);
        assert_eq!(small.keys(), vec!["key:0", "key:3", "key:4"]);
        small.assert_consistent();
    }

    #[test]
    fn test_keys_in_insertion_order() {
        let mut store = Store::new();

        store.set("first", 1, None).unwrap();
        store.set("second", 2, Some(SHORT)).unwrap();
        store.set("third", 3, None).unwrap();
        store.set("first", 10, None).unwrap();

        assert_eq!(store.keys(), vec!["first", "second", "third"]);

        wait_out(SHORT);
        assert_eq!(store.keys(), vec!["first", "third"]);
        assert_eq!(store.len(), 2);
        store.assert_consistent();
    }

    #[test]
    fn test_incr() {
        let mut store = Store::new();

        assert_eq!(store.incr("counter", 1, None), Ok(1));
        assert_eq!(store.incr("counter", 1, None), Ok(2));
        assert_eq!(store.incr("counter", 10, None), Ok(12));
        assert_eq!(store.decr("counter", 5, None), Ok(7));
        assert_eq!(store.decr("fresh", 3, None), Ok(-3));
    }

    #[test]
    fn test_incr_creates_with_ttl() {
        let mut store = Store::new();

        assert_eq!(store.incr("counter", 5, Some(Duration::from_secs(30))), Ok(5));
        assert!(store.ttl("counter") >= 29);
        store.assert_consistent();
    }

    #[test]
    fn test_incr_resets_ttl_on_existing_key() {
        let mut store = Store::new();

        store.set("counter", 5, None).unwrap();
        assert_eq!(store.incr("counter", 1, Some(Duration::from_secs(30))), Ok(6));
        assert!(store.ttl("counter") >= 29);

        // Without a TTL the existing deadline is kept.
        assert_eq!(store.incr("counter", 1, None), Ok(7));
        assert!(store.ttl("counter") >= 29);
        store.assert_consistent();
    }

    #[test]
    fn test_incr_non_integer() {
        let mut store = Store::new();

        store.set("name", "Ariz", None).unwrap();
        let err = store.incr("name", 1, Some(Duration::from_secs(30))).unwrap_err();
        assert_eq!(err, StoreError::NotAnInteger("str"));
        assert_eq!(store.get("name"), Some(Value::from("Ariz")));
        assert_eq!(store.ttl("name"), -1);
    }

    #[test]
    fn test_incr_after_expiry_restarts_at_zero() {
        let mut store = Store::new();

        store.set("counter", 41, Some(SHORT)).unwrap();
        wait_out(SHORT);
        assert_eq!(store.incr("counter", 1, None), Ok(1));
        assert_eq!(store.ttl("counter"), -1);
        store.assert_consistent();
    }

    #[test]
    fn test_expire() {
        let mut store = Store::new();

        assert_eq!(store.expire("missing", Duration::from_secs(10), false, false), Ok(false));

        store.set("key", "value", None).unwrap();
        assert_eq!(store.expire("key", Duration::from_secs(10), false, true), Ok(false));
        assert_eq!(store.expire("key", Duration::from_secs(10), true, false), Ok(true));
        assert_eq!(store.expire("key", Duration::from_secs(20), true, false), Ok(false));
        assert_eq!(store.expire("key", Duration::from_secs(20), false, true), Ok(true));
        assert!(store.ttl("key") >= 19);
        assert_eq!(store.get("key"), Some(Value::from("value")));
        store.assert_consistent();
    }

    #[test]
    fn test_expire_conflicting_flags() {
        let mut store = Store::new();
        store.set("key", 1, None).unwrap();

        assert_eq!(
            store.expire("key", Duration::from_secs(1), true, true),
            Err(StoreError::ConflictingFlags)
        );
        assert_eq!(store.ttl("key"), -1);
    }

    #[test]
    fn test_persist() {
        let mut store = Store::new();

        store.set("key", 1, Some(Duration::from_secs(10))).unwrap();
        assert!(store.persist("key"));
        assert!(!store.persist("key"));
        assert!(!store.persist("missing"));
        assert_eq!(store.ttl("key"), -1);
        store.assert_consistent();
    }

    #[test]
    fn test_flushdb() {
        let mut store = Store::new();

        store.set("a", 1, None).unwrap();
        store.set("b", 2, Some(Duration::from_secs(10))).unwrap();
        store.flushdb();

        assert!(store.is_empty());
        assert_eq!(store.stats().expiring, 0);
    }

    #[test]
    fn test_is_empty_ignores_expiry() {
        let mut store = Store::new();

        store.set("key", 1, Some(SHORT)).unwrap();
        wait_out(SHORT);

        assert!(!store.is_empty());
        assert!(!store.exists("key"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_default_ttl() {
        let mut store = Store::with_default_ttl(Some(Duration::from_secs(50))).unwrap();

        store.set("a", 1, None).unwrap();
        assert!(store.ttl("a") >= 49);

        store.set_default_ttl(None).unwrap();
        store.set("b", 1, None).unwrap();
        assert_eq!(store.ttl("b"), -1);
        assert!(store.ttl("a") >= 49);

        assert_eq!(store.set_default_ttl(Some(Duration::ZERO)), Err(StoreError::InvalidTtl));
    }

    #[test]
    fn test_stats() {
        let mut store = Store::new();

        store.set("a", 1, None).unwrap();
        store.get("a");
        store.get("b");
        store.delete(&["a"]);

        let stats = store.stats();
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.keys, 0);
    }

    #[test]
    fn test_sample_expiring() {
        let mut store = Store::new();
        for i in 0..50 {
            store.set(format!("key:{i}"), i, Some(Duration::from_secs(60))).unwrap();
        }
        store.set("persistent", 1, None).unwrap();

        let mut rng = rand::rng();
        let sample = store.sample_expiring(20, &mut rng);
        assert_eq!(sample.len(), 20);
        let distinct: HashSet<&String> = sample.iter().collect();
        assert_eq!(distinct.len(), 20);
        assert!(!sample.contains(&"persistent".to_string()));

        assert_eq!(store.sample_expiring(100, &mut rng).len(), 50);
    }
}
