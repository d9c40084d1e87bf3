//! Client Module
//!
//! A thin, blocking wrapper over one connection: each method builds a
//! [`Request`], sends it, waits for the [`Response`] and unpacks the reply
//! into a plain Rust value.
//!
//! Requests and replies are matched only by the channel they travel on, so
//! a client has at most one request in flight. The `&mut self` receivers
//! enforce that; share a server across threads by giving each thread its
//! own `Client`.

use crate::commands::{Attribute, AttributeValue, Command, ParseError, Reply, Request};
use crate::connection::ChannelError;
use crate::server::{ClientEndpoint, Server, ServerError};
use crate::storage::{StoreError, StoreStats, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors seen by a client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The operation ran and reported a precondition violation
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unexpected reply: {0:?}")]
    UnexpectedReply(Reply),
}

pub type Result<T> = std::result::Result<T, ClientError>;

macro_rules! expect_reply {
    ($reply:expr, $variant:ident) => {
        match $reply {
            Reply::$variant(value) => Ok(value),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    };
}

/// A blocking connection to a [`Server`].
///
/// # Example
///
/// ```
/// use solokv::{Client, Server, ServerConfig, Value};
///
/// let server = Server::new(ServerConfig::default()).unwrap();
/// let mut client = Client::connect(&server).unwrap();
///
/// client.set("a", 1, None).unwrap();
/// assert_eq!(client.incr("a", 5, None).unwrap(), 6);
/// assert_eq!(client.get("a").unwrap(), Some(Value::Int(6)));
/// ```
#[derive(Debug)]
pub struct Client {
    endpoint: ClientEndpoint,
    timeout: Option<Duration>,
}

impl Client {
    /// Starts `server` if needed and opens a connection to it.
    pub fn connect(server: &Server) -> Result<Self> {
        server.start()?;
        let endpoint = server.open_connection()?;
        Ok(Self::from_endpoint(endpoint))
    }

    /// Wraps an already-open connection.
    pub fn from_endpoint(endpoint: ClientEndpoint) -> Self {
        Self {
            endpoint,
            timeout: None,
        }
    }

    /// Sets how long each call waits for its reply (`None` = forever).
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Changes the reply timeout for later calls.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// The current reply timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether either side has closed the connection, including after a timeout.
    pub fn is_closed(&self) -> bool {
        self.endpoint.is_closed()
    }

    /// Closes the connection. Further calls fail with [`ChannelError::Closed`].
    pub fn close(&self) {
        self.endpoint.close();
    }

    // ========================================================================
    // Raw requests
    // ========================================================================

    /// Sends `request` and waits for its reply using the client's timeout.
    pub fn execute(&mut self, request: Request) -> Result<Reply> {
        self.execute_timeout(request, self.timeout)
    }

    /// Sends `request` and waits up to `timeout` for its reply.
    ///
    /// On timeout the reply is still in flight and would be mistaken for
    /// the answer to the next request, so the connection is closed.
    pub fn execute_timeout(&mut self, request: Request, timeout: Option<Duration>) -> Result<Reply> {
        self.endpoint.send(request)?;

        let received = match timeout {
            None => self.endpoint.recv(),
            Some(timeout) => self.endpoint.recv_timeout(timeout),
        };
        let response = match received {
            Ok(response) => response,
            Err(ChannelError::Timeout) => {
                debug!(conn = %self.endpoint.id(), "reply timed out, closing connection");
                self.endpoint.close();
                return Err(ChannelError::Timeout.into());
            }
            Err(err) => return Err(err.into()),
        };

        Ok(response.into_result()?)
    }

    /// Invokes an operation by name, see [`Command::parse`].
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Reply> {
        let command = Command::parse(name, args)?;
        self.execute(Request::Call(command))
    }

    fn run(&mut self, command: Command) -> Result<Reply> {
        self.execute(Request::Call(command))
    }

    // ========================================================================
    // Store operations
    // ========================================================================

    /// The live value at `key`, if any.
    pub fn get(&mut self, key: &str) -> Result<Option<Value>> {
        let reply = self.run(Command::Get { key: key.into() })?;
        expect_reply!(reply, Value)
    }

    /// Stores `value`, replacing any previous value and expiry.
    pub fn set(&mut self, key: &str, value: impl Into<Value>, ttl: Option<Duration>) -> Result<bool> {
        let reply = self.run(Command::Set {
            key: key.into(),
            value: value.into(),
            ttl,
        })?;
        expect_reply!(reply, Bool)
    }

    /// Stores `value` only if `key` is absent; `false` if it was present.
    pub fn setnx(&mut self, key: &str, value: impl Into<Value>, ttl: Option<Duration>) -> Result<bool> {
        let reply = self.run(Command::SetNx {
            key: key.into(),
            value: value.into(),
            ttl,
        })?;
        expect_reply!(reply, Bool)
    }

    /// Values for `keys` in order, `None` where absent.
    pub fn mget<K: AsRef<str>>(&mut self, keys: &[K]) -> Result<Vec<Option<Value>>> {
        let keys = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let reply = self.run(Command::MGet { keys })?;
        expect_reply!(reply, Values)
    }

    /// Writes every pair with the same `ttl`.
    pub fn mset<I, K, V>(&mut self, data: I, ttl: Option<Duration>) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let data = collect_pairs(data);
        let reply = self.run(Command::MSet { data, ttl })?;
        expect_reply!(reply, Bool)
    }

    /// Writes only the keys that are absent; returns how many were written.
    pub fn msetnx<I, K, V>(&mut self, data: I, ttl: Option<Duration>) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let data = collect_pairs(data);
        let reply = self.run(Command::MSetNx { data, ttl })?;
        expect_reply!(reply, Count)
    }

    /// Removes `keys`; returns how many were present.
    pub fn delete<K: AsRef<str>>(&mut self, keys: &[K]) -> Result<usize> {
        let keys = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let reply = self.run(Command::Delete { keys })?;
        expect_reply!(reply, Count)
    }

    /// Whether `key` holds a live value.
    pub fn exists(&mut self, key: &str) -> Result<bool> {
        let reply = self.run(Command::Exists { key: key.into() })?;
        expect_reply!(reply, Bool)
    }

    /// Live keys in insertion order.
    pub fn keys(&mut self) -> Result<Vec<String>> {
        let reply = self.run(Command::Keys)?;
        expect_reply!(reply, Keys)
    }

    /// Remaining seconds; `-1` without expiry, `-2` when absent.
    pub fn ttl(&mut self, key: &str) -> Result<i64> {
        let reply = self.run(Command::Ttl { key: key.into() })?;
        expect_reply!(reply, Integer)
    }

    /// Like [`Client::ttl`], in milliseconds.
    pub fn pttl(&mut self, key: &str) -> Result<i64> {
        let reply = self.run(Command::Pttl { key: key.into() })?;
        expect_reply!(reply, Integer)
    }

    /// Adds `amount` to an integer, creating it at 0 first; returns the new value.
    ///
    /// A `ttl` resets the expiry of an existing key.
    pub fn incr(&mut self, key: &str, amount: i64, ttl: Option<Duration>) -> Result<i64> {
        let reply = self.run(Command::Incr {
            key: key.into(),
            amount,
            ttl,
        })?;
        expect_reply!(reply, Integer)
    }

    /// Subtracts `amount`, see [`Client::incr`].
    pub fn decr(&mut self, key: &str, amount: i64, ttl: Option<Duration>) -> Result<i64> {
        let reply = self.run(Command::Decr {
            key: key.into(),
            amount,
            ttl,
        })?;
        expect_reply!(reply, Integer)
    }

    /// Sets an expiry on an existing key.
    ///
    /// `nx` requires no current expiry, `xx` requires one. Passing both is
    /// [`StoreError::ConflictingFlags`].
    pub fn expire(&mut self, key: &str, ttl: Duration, nx: bool, xx: bool) -> Result<bool> {
        let reply = self.run(Command::Expire {
            key: key.into(),
            ttl,
            nx,
            xx,
        })?;
        expect_reply!(reply, Bool)
    }

    /// Drops the expiry from `key`; `true` only if it had one.
    pub fn persist(&mut self, key: &str) -> Result<bool> {
        let reply = self.run(Command::Persist { key: key.into() })?;
        expect_reply!(reply, Bool)
    }

    /// Removes every key.
    pub fn flushdb(&mut self) -> Result<()> {
        match self.run(Command::FlushDb)? {
            Reply::Unit => Ok(()),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Whether the store holds no entries, counting expired ones not yet reclaimed.
    pub fn is_empty(&mut self) -> Result<bool> {
        let reply = self.execute(Request::Get(Attribute::Empty))?;
        expect_reply!(reply, Bool)
    }

    /// Entry count, counting expired ones not yet reclaimed.
    pub fn len(&mut self) -> Result<usize> {
        let reply = self.execute(Request::Get(Attribute::Len))?;
        expect_reply!(reply, Count)
    }

    /// The TTL applied to writes without one.
    pub fn default_ttl(&mut self) -> Result<Option<Duration>> {
        let reply = self.execute(Request::Get(Attribute::DefaultTtl))?;
        expect_reply!(reply, Ttl)
    }

    /// Changes the default TTL for later writes.
    pub fn set_default_ttl(&mut self, ttl: Option<Duration>) -> Result<()> {
        match self.execute(Request::Set(AttributeValue::DefaultTtl(ttl)))? {
            Reply::Unit => Ok(()),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    /// A copy of the store counters.
    pub fn stats(&mut self) -> Result<StoreStats> {
        let reply = self.execute(Request::Get(Attribute::Stats))?;
        expect_reply!(reply, Stats)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.endpoint.close();
    }
}

fn collect_pairs<I, K, V>(data: I) -> Vec<(String, Value)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    data.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

// ============================================================================
// Tests
// ============================================================================
