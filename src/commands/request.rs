//! Request and Response Messages
//!
//! Everything that travels over a channel between a caller and the owner
//! thread. A request is one of three kinds:
//!
//! - [`Request::Call`]: invoke a store operation ([`Command`])
//! - [`Request::Get`]: read a store attribute ([`Attribute`])
//! - [`Request::Set`]: assign a store attribute ([`AttributeValue`])
//!
//! and every request is answered by exactly one [`Response`]: either
//! `Return` with a [`Reply`], or `Error` with the [`StoreError`] the
//! operation failed with.
//!
//! The operation set is closed: there is no way to send a request naming an
//! operation that does not exist. Looking an operation up *by name* is the
//! job of [`Command::parse`], which fails with
//! [`ParseError::UnknownCommand`] for names it does not know.

use crate::storage::{StoreError, StoreStats, Value};
use std::time::Duration;

/// A store operation with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: Value,
        ttl: Option<Duration>,
    },
    /// Set only if the key is absent or expired.
    SetNx {
        key: String,
        value: Value,
        ttl: Option<Duration>,
    },
    MGet {
        keys: Vec<String>,
    },
    MSet {
        data: Vec<(String, Value)>,
        ttl: Option<Duration>,
    },
    /// Set each key that is absent or expired; skip the rest.
    MSetNx {
        data: Vec<(String, Value)>,
        ttl: Option<Duration>,
    },
    Delete {
        keys: Vec<String>,
    },
    Exists {
        key: String,
    },
    Keys,
    Ttl {
        key: String,
    },
    Pttl {
        key: String,
    },
    Incr {
        key: String,
        amount: i64,
        ttl: Option<Duration>,
    },
    Decr {
        key: String,
        amount: i64,
        ttl: Option<Duration>,
    },
    Expire {
        key: String,
        ttl: Duration,
        /// Only if the key has no expiry yet.
        nx: bool,
        /// Only if the key already has an expiry.
        xx: bool,
    },
    /// Removes a key's expiry.
    Persist {
        key: String,
    },
    FlushDb,
}

/// A readable store attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    /// Whether the table has no entries (no lazy expiry).
    Empty,
    /// Number of entries in the table (no lazy expiry).
    Len,
    /// TTL applied to writes that supply none.
    DefaultTtl,
    /// Store counters.
    Stats,
}

/// An assignable store attribute with its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeValue {
    DefaultTtl(Option<Duration>),
}

/// A message from a caller to the owner thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Call(Command),
    Get(Attribute),
    Set(AttributeValue),
}

impl From<Command> for Request {
    fn from(command: Command) -> Self {
        Request::Call(command)
    }
}

/// The successful result of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Acknowledgement with no value (FLUSHDB, attribute assignment).
    Unit,
    Bool(bool),
    Integer(i64),
    Count(usize),
    /// A single lookup (`None` = absent or expired).
    Value(Option<Value>),
    /// MGET results, one slot per requested key.
    Values(Vec<Option<Value>>),
    Keys(Vec<String>),
    Ttl(Option<Duration>),
    Stats(StoreStats),
}

/// A message from the owner thread back to a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Return(Reply),
    Error(StoreError),
}

impl Response {
    /// Converts to a `Result`, turning `Error` into `Err`.
    pub fn into_result(self) -> Result<Reply, StoreError> {
        match self {
            Response::Return(reply) => Ok(reply),
            Response::Error(err) => Err(err),
        }
    }
}

impl From<Result<Reply, StoreError>> for Response {
    fn from(result: Result<Reply, StoreError>) -> Self {
        match result {
            Ok(reply) => Response::Return(reply),
            Err(err) => Response::Error(err),
        }
    }
}

/// Errors from resolving a command by name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{0}'")]
    WrongArity(&'static str),

    #[error("invalid argument for '{command}': {reason}")]
    InvalidArgument {
        command: &'static str,
        reason: &'static str,
    },
}

fn invalid(command: &'static str, reason: &'static str) -> ParseError {
    ParseError::InvalidArgument { command, reason }
}

fn required(
    args: &mut impl Iterator<Item = Value>,
    command: &'static str,
) -> Result<Value, ParseError> {
    args.next().ok_or(ParseError::WrongArity(command))
}

fn key_arg(command: &'static str, value: Value) -> Result<String, ParseError> {
    match value {
        Value::Str(key) => Ok(key),
        _ => Err(invalid(command, "key must be a string")),
    }
}

/// Seconds as an integer or a float.
fn ttl_arg(command: &'static str, value: Value) -> Result<Duration, ParseError> {
    let ttl = match value {
        Value::Int(secs) => u64::try_from(secs).ok().map(Duration::from_secs),
        Value::Float(secs) => Duration::try_from_secs_f64(secs).ok(),
        _ => None,
    };
    ttl.ok_or_else(|| invalid(command, "ttl must be a non-negative number of seconds"))
}

fn int_arg(command: &'static str, value: Value) -> Result<i64, ParseError> {
    value
        .as_int()
        .ok_or_else(|| invalid(command, "amount must be an integer"))
}

fn pairs_arg(command: &'static str, args: Vec<Value>) -> Result<Vec<(String, Value)>, ParseError> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(ParseError::WrongArity(command));
    }
    let mut data = Vec::with_capacity(args.len() / 2);
    let mut args = args.into_iter();
    while let (Some(key), Some(value)) = (args.next(), args.next()) {
        data.push((key_arg(command, key)?, value));
    }
    Ok(data)
}

impl Command {
    /// The operation's name, as accepted by [`Command::parse`].
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "get",
            Command::Set { .. } => "set",
            Command::SetNx { .. } => "setnx",
            Command::MGet { .. } => "mget",
            Command::MSet { .. } => "mset",
            Command::MSetNx { .. } => "msetnx",
            Command::Delete { .. } => "delete",
            Command::Exists { .. } => "exists",
            Command::Keys => "keys",
            Command::Ttl { .. } => "ttl",
            Command::Pttl { .. } => "pttl",
            Command::Incr { .. } => "incr",
            Command::Decr { .. } => "decr",
            Command::Expire { .. } => "expire",
            Command::Persist { .. } => "persist",
            Command::FlushDb => "flushdb",
        }
    }

    /// Resolves an operation by name and binds its positional arguments.
    ///
    /// Names are case-insensitive. TTLs are given in seconds (integer or
    /// float); keys must be strings.
    ///
    /// | name | arguments |
    /// |------|-----------|
    /// | `get`, `exists`, `ttl`, `pttl`, `persist` | key |
    /// | `set`, `setnx` | key value [ttl] |
    /// | `mget`, `delete` (`del`) | key [key ...] |
    /// | `mset`, `msetnx` | key value [key value ...] |
    /// | `incr`, `decr` | key [amount [ttl]] |
    /// | `expire` | key ttl [`"nx"` \| `"xx"`] |
    /// | `keys`, `flushdb` | |
    ///
    /// # Example
    ///
    /// ```
    /// use solokv::commands::{Command, ParseError};
    /// use solokv::storage::Value;
    ///
    /// let cmd = Command::parse("INCR", vec![Value::from("hits"), Value::from(5)]).unwrap();
    /// assert_eq!(cmd.name(), "incr");
    ///
    /// let err = Command::parse("frobnicate", vec![]).unwrap_err();
    /// assert_eq!(err, ParseError::UnknownCommand("frobnicate".to_string()));
    /// ```
    pub fn parse(name: &str, args: Vec<Value>) -> Result<Self, ParseError> {
        let lowered = name.to_ascii_lowercase();
        let arity = args.len();
        let mut it = args.into_iter();

        let command = match lowered.as_str() {
            "get" | "exists" | "ttl" | "pttl" | "persist" => {
                let (Some(key), None) = (it.next(), it.next()) else {
                    return Err(ParseError::WrongArity(static_name(&lowered)));
                };
                let key = key_arg(static_name(&lowered), key)?;
                match lowered.as_str() {
                    "get" => Command::Get { key },
                    "exists" => Command::Exists { key },
                    "ttl" => Command::Ttl { key },
                    "pttl" => Command::Pttl { key },
                    _ => Command::Persist { key },
                }
            }
            "set" | "setnx" => {
                let name = static_name(&lowered);
                if !(2..=3).contains(&arity) {
                    return Err(ParseError::WrongArity(name));
                }
                let key = key_arg(name, required(&mut it, name)?)?;
                let value = required(&mut it, name)?;
                let ttl = it.next().map(|v| ttl_arg(name, v)).transpose()?;
                if lowered == "set" {
                    Command::Set { key, value, ttl }
                } else {
                    Command::SetNx { key, value, ttl }
                }
            }
            "mget" | "delete" | "del" => {
                let name = static_name(&lowered);
                if arity == 0 {
                    return Err(ParseError::WrongArity(name));
                }
                let keys = it
                    .map(|v| key_arg(name, v))
                    .collect::<Result<Vec<_>, _>>()?;
                if name == "mget" {
                    Command::MGet { keys }
                } else {
                    Command::Delete { keys }
                }
            }
            "mset" | "msetnx" => {
                let name = static_name(&lowered);
                let data = pairs_arg(name, it.collect())?;
                if name == "mset" {
                    Command::MSet { data, ttl: None }
                } else {
                    Command::MSetNx { data, ttl: None }
                }
            }
            "incr" | "decr" => {
                let name = static_name(&lowered);
                if !(1..=3).contains(&arity) {
                    return Err(ParseError::WrongArity(name));
                }
                let key = key_arg(name, required(&mut it, name)?)?;
                let amount = it.next().map(|v| int_arg(name, v)).transpose()?.unwrap_or(1);
                let ttl = it.next().map(|v| ttl_arg(name, v)).transpose()?;
                if name == "incr" {
                    Command::Incr { key, amount, ttl }
                } else {
                    Command::Decr { key, amount, ttl }
                }
            }
            "expire" => {
                if !(2..=3).contains(&arity) {
                    return Err(ParseError::WrongArity("expire"));
                }
                let key = key_arg("expire", required(&mut it, "expire")?)?;
                let ttl = ttl_arg("expire", required(&mut it, "expire")?)?;
                let (nx, xx) = match it.next() {
                    None => (false, false),
                    Some(flag) => match flag.as_str().map(str::to_ascii_lowercase).as_deref() {
                        Some("nx") => (true, false),
                        Some("xx") => (false, true),
                        _ => return Err(invalid("expire", "flag must be \"nx\" or \"xx\"")),
                    },
                };
                Command::Expire { key, ttl, nx, xx }
            }
            "keys" | "flushdb" => {
                let name = static_name(&lowered);
                if arity != 0 {
                    return Err(ParseError::WrongArity(name));
                }
                if name == "keys" {
                    Command::Keys
                } else {
                    Command::FlushDb
                }
            }
            _ => return Err(ParseError::UnknownCommand(name.to_string())),
        };

        Ok(command)
    }
}

/// Maps a known lower-case command name to its static form.
fn static_name(lowered: &str) -> &'static str {
    match lowered {
        "get" => "get",
        "exists" => "exists",
        "ttl" => "ttl",
        "pttl" => "pttl",
        "persist" => "persist",
        "set" => "set",
        "setnx" => "setnx",
        "mget" => "mget",
        "delete" | "del" => "delete",
        "mset" => "mset",
        "msetnx" => "msetnx",
        "incr" => "incr",
        "decr" => "decr",
        "expire" => "expire",
        "keys" => "keys",
        "flushdb" => "flushdb",
        _ => "unknown",
    }
}
