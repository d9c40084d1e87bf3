//! Stored Values and Their Expiration Policy
//!
//! A [`Value`] is the payload a caller stores. An [`Entry`] wraps a value
//! together with its (optional) expiry deadline and the bookkeeping the
//! store needs to keep key ordering stable.
//!
//! There is no "null" variant. Absence is always `Option::None` at the
//! store's API, never a stored value.

use crate::storage::engine::StoreError;
use bytes::Bytes;
use std::fmt;
use std::time::{Duration, Instant};

/// A payload held by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer. The only variant `INCR`/`DECR` accept.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// UTF-8 text.
    Str(String),
    /// Arbitrary binary data.
    Bytes(Bytes),
}

impl Value {
    /// Returns the integer if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name, used in error messages and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

/// Longest TTL the store accepts: 100 years.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// The instant `ttl` from now, or `None` if the clock cannot represent it.
#[inline]
pub(crate) fn deadline_after(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

/// A stored value with its optional expiry time.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The actual value stored
    pub value: Value,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
    /// Insertion sequence, kept across overwrites so `keys()` stays ordered
    pub(crate) seq: u64,
}

impl Entry {
    /// Creates a new entry, expiring after `ttl` if one is given.
    ///
    /// A `ttl` past what [`Instant`] can represent never expires.
    pub fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(deadline_after),
            seq: 0,
        }
    }

    /// Whether an explicit expiration was set.
    #[inline]
    pub fn has_expiry(&self) -> bool {
        self.expires_at.is_some()
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    #[inline]
    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Remaining lifetime, or `None` if the entry never expires.
    ///
    /// Saturates at zero for an entry that is already past its deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }

    /// Adds `amount` to an integer payload in place.
    pub(crate) fn increment(&mut self, amount: i64) -> Result<i64, StoreError> {
        let current = self
            .value
            .as_int()
            .ok_or(StoreError::NotAnInteger(self.value.type_name()))?;
        let next = current
            .checked_add(amount)
            .ok_or(StoreError::Overflow)?;
        self.value = Value::Int(next);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = Entry::new(Value::from("v"), None);
        assert!(!entry.has_expiry());
        assert!(!entry.is_expired());
        assert_eq!(entry.remaining(), None);
    }

    #[test]
    fn test_entry_with_ttl_expires() {
        let entry = Entry::new(Value::from(1), Some(Duration::from_millis(20)));
        assert!(entry.has_expiry());
        assert!(!entry.is_expired());

        std::thread::sleep(Duration::from_millis(40));
        assert!(entry.is_expired());
        assert_eq!(entry.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let entry = Entry::new(Value::from(1), Some(Duration::MAX));
        assert!(!entry.has_expiry());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_increment_rejects_non_integer() {
        let mut entry = Entry::new(Value::from("text"), None);
        assert!(entry.increment(1).is_err());
        assert_eq!(entry.value, Value::from("text"));
    }

    #[test]
    fn test_increment_overflow_leaves_value() {
        let mut entry = Entry::new(Value::Int(i64::MAX), None);
        assert!(entry.increment(1).is_err());
        assert_eq!(entry.value, Value::Int(i64::MAX));
        assert_eq!(entry.increment(-1).unwrap(), i64::MAX - 1);
    }
}
