//! Server Module
//!
//! The [`Server`] owns the one [`Store`] and the single thread allowed to
//! touch it. Callers never see the store: they open a connection, send
//! [`Request`]s over it, and block for the [`Response`].
//!
//! ## Owner Loop
//!
//! ```text
//!          ┌──────────────────────────────────────────┐
//!          │              while !stopped              │
//!          │                                          │
//!          │  1. sweeper.run_cycle(store)             │
//!          │  2. registry.wait(poll)  ── empty ──┐    │
//!          │  3. selector.select(snapshot, poll) │    │
//!          │  4. for each ready endpoint:        │    │
//!          │       closed? -> deregister         │    │
//!          │       else    -> handle_request     │    │
//!          │                 <───────────────────┘    │
//!          └──────────────────────────────────────────┘
//!                              │ exit (stop or panic)
//!                              ▼
//!                 close + deregister every connection
//! ```
//!
//! Both waits are bounded by [`ServerConfig::poll_timeout`], so the sweeper
//! keeps running when there is no traffic. Opening a connection interrupts
//! step 3, so the new connection joins the next snapshot right away.

use crate::commands::{CommandHandler, Request, Response};
use crate::connection::{channel, ChannelError, ConnectionRegistry, Endpoint, Selector};
use crate::storage::{ExpiryConfig, ExpirySweeper, Store, StoreError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// The caller's side of a connection.
pub type ClientEndpoint = Endpoint<Request, Response>;

/// The owner thread's side of a connection.
pub type ServerEndpoint = Endpoint<Response, Request>;

const OWNER_THREAD_NAME: &str = "solokv-owner";

// ============================================================================
// Configuration
// ============================================================================

/// Server configuration.
///
/// # Example
///
/// ```
/// use solokv::server::{Server, ServerConfig, ServerError};
/// use solokv::storage::{ExpiryConfig, StoreError, MAX_TTL};
/// use std::time::Duration;
///
/// let config = ServerConfig::default()
///     .with_poll_timeout(Duration::from_millis(50))
///     .with_default_ttl(Some(Duration::from_secs(60)))
///     .with_expiry(ExpiryConfig::default());
/// assert_eq!(config.poll_timeout, Duration::from_millis(50));
/// assert!(Server::new(config).is_ok());
///
/// let too_long = ServerConfig::default().with_default_ttl(Some(MAX_TTL * 2));
/// assert!(matches!(Server::new(too_long), Err(ServerError::Config(StoreError::InvalidTtl))));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upper bound on each of the owner loop's waits
    pub poll_timeout: Duration,
    /// TTL applied to writes that supply none
    pub default_ttl: Option<Duration>,
    /// Active expiry tuning
    pub expiry: ExpiryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            default_ttl: None,
            expiry: ExpiryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Bounds how long the owner loop waits before running the sweeper again.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// TTL for writes that give none.
    ///
    /// Zero or over [`MAX_TTL`](crate::storage::MAX_TTL) makes [`Server::new`] fail.
    pub fn with_default_ttl(mut self, default_ttl: Option<Duration>) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    /// Replaces the sweeper tuning.
    pub fn with_expiry(mut self, expiry: ExpiryConfig) -> Self {
        self.expiry = expiry;
        self
    }
}

// ============================================================================
// Errors and statistics
// ============================================================================

/// Errors from the server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server stopped")]
    Stopped,

    #[error("failed to spawn owner thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid server configuration: {0}")]
    Config(#[from] StoreError),

    #[error("owner thread panicked")]
    Panicked,
}

/// Server counters, updated from the owner thread and from callers.
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Connections handed out by `open_connection`
    pub connections_opened: AtomicU64,
    /// Connections deregistered (by the caller closing, or at teardown)
    pub connections_closed: AtomicU64,
    /// Requests answered
    pub requests_handled: AtomicU64,
    /// Requests answered with `Response::Error`
    pub error_replies: AtomicU64,
}

impl ServerStats {
    fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    fn request_handled(&self, response: &Response) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);
        if matches!(response, Response::Error(_)) {
            self.error_replies.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Connections currently registered.
    pub fn active_connections(&self) -> u64 {
        let opened = self.connections_opened.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);
        opened.saturating_sub(closed)
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Default)]
struct Lifecycle {
    started: bool,
    stopped: bool,
}

/// State shared between the `Server` handle and the owner thread.
#[derive(Debug)]
struct Shared {
    poll_timeout: Duration,
    expiry: ExpiryConfig,
    registry: ConnectionRegistry<Response, Request>,
    selector: Arc<Selector>,
    lifecycle: Mutex<Lifecycle>,
    stopped: AtomicBool,
    stats: ServerStats,
    /// Makes the owner loop panic on its next pass
    #[cfg(test)]
    fail_next_pass: AtomicBool,
}

/// The store's owner.
///
/// # Example
///
/// ```
/// use solokv::commands::{Command, Reply, Request, Response};
/// use solokv::server::{Server, ServerConfig};
/// use solokv::storage::Value;
///
/// let server = Server::new(ServerConfig::default()).unwrap();
/// server.start().unwrap();
///
/// let conn = server.open_connection().unwrap();
/// conn.send(Request::Call(Command::Set { key: "a".into(), value: Value::from(1), ttl: None }))
///     .unwrap();
/// assert_eq!(conn.recv().unwrap(), Response::Return(Reply::Bool(true)));
///
/// server.stop();
/// server.join().unwrap();
/// assert!(server.open_connection().is_err());
/// ```
#[derive(Debug)]
pub struct Server {
    shared: Arc<Shared>,
    /// Moved to the owner thread on `start`
    handler: Mutex<Option<CommandHandler>>,
    owner: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Creates a server with an empty store. Nothing runs until `start`.
    ///
    /// Fails if the configured default TTL is zero or over [`MAX_TTL`](crate::storage::MAX_TTL).
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, ServerError> {
        let store = Store::with_default_ttl(config.default_ttl)?;

        let shared = Arc::new(Shared {
            poll_timeout: config.poll_timeout,
            expiry: config.expiry,
            registry: ConnectionRegistry::new(),
            selector: Arc::new(Selector::new()),
            lifecycle: Mutex::new(Lifecycle::default()),
            stopped: AtomicBool::new(false),
            stats: ServerStats::default(),
            #[cfg(test)]
            fail_next_pass: AtomicBool::new(false),
        });

        Ok(Arc::new(Self {
            shared,
            handler: Mutex::new(Some(CommandHandler::new(store))),
            owner: Mutex::new(None),
        }))
    }

    /// Opens a connection and returns the caller's end of it.
    ///
    /// Connections may be opened before `start`; their requests queue up
    /// until the owner loop runs.
    pub fn open_connection(&self) -> Result<ClientEndpoint, ServerError> {
        let lifecycle = self.shared.lifecycle.lock();
        if lifecycle.stopped {
            return Err(ServerError::Stopped);
        }

        let (client, server_end) = channel::pair::<Request, Response>();
        server_end.watch(Arc::clone(&self.shared.selector));
        self.shared.registry.add(server_end);
        self.shared.selector.interrupt();
        drop(lifecycle);

        self.shared.stats.connection_opened();
        debug!(conn = %client.id(), "connection opened");
        Ok(client)
    }

    /// Launches the owner thread. Calling it again is a no-op.
    ///
    /// A stopped server never restarts: this fails with
    /// [`ServerError::Stopped`].
    pub fn start(&self) -> Result<(), ServerError> {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.stopped {
            return Err(ServerError::Stopped);
        }
        if lifecycle.started {
            return Ok(());
        }

        let handler = self.handler.lock().take().ok_or(ServerError::Stopped)?;
        let shared = Arc::clone(&self.shared);
        let owner = thread::Builder::new()
            .name(OWNER_THREAD_NAME.to_string())
            .spawn(move || serve_forever(&shared, handler))
            .map_err(ServerError::Spawn)?;

        lifecycle.started = true;
        *self.owner.lock() = Some(owner);
        info!(poll_timeout = ?self.shared.poll_timeout, "server started");
        Ok(())
    }

    /// Asks the owner loop to exit.
    ///
    /// The loop finishes whatever request it is executing, then closes
    /// every connection. A server that was never started closes its
    /// connections here.
    pub fn stop(&self) {
        let started = {
            let mut lifecycle = self.shared.lifecycle.lock();
            if lifecycle.stopped {
                return;
            }
            lifecycle.stopped = true;
            lifecycle.started
        };
        info!("server stop requested");
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.registry.close();
        self.shared.selector.close();

        if !started {
            self.shared.teardown();
        }
    }

    /// Whether `stop` has been called or the owner loop has exited.
    pub fn stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Connection and request counters.
    pub fn stats(&self) -> &ServerStats {
        &self.shared.stats
    }

    /// Waits for the owner thread to finish its teardown.
    ///
    /// Returns immediately if the server was never started or has already
    /// been joined.
    pub fn join(&self) -> Result<(), ServerError> {
        let owner = self.owner.lock().take();
        match owner {
            Some(owner) => owner.join().map_err(|_| ServerError::Panicked),
            None => Ok(()),
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Marks the server stopped, then closes and deregisters every
    /// connection so blocked callers see `Closed`.
    fn teardown(&self) {
        self.lifecycle.lock().stopped = true;
        self.stopped.store(true, Ordering::Release);
        self.registry.close();
        self.selector.close();

        let endpoints = self.registry.drain();
        let closed = endpoints.len();
        for endpoint in endpoints {
            endpoint.close();
            self.stats.connection_closed();
        }
        info!(closed_connections = closed, "server stopped");
    }
}

/// Runs teardown when the owner loop exits, including by unwinding.
struct TeardownGuard<'a> {
    shared: &'a Shared,
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!("owner loop exited abnormally, closing all connections");
        }
        self.shared.teardown();
    }
}

// ============================================================================
// Owner loop
// ============================================================================

fn serve_forever(shared: &Shared, mut handler: CommandHandler) {
    let _guard = TeardownGuard { shared };
    let mut sweeper = ExpirySweeper::new(shared.expiry.clone());

    while !shared.is_stopped() {
        sweeper.run_cycle(handler.store_mut());

        #[cfg(test)]
        if shared.fail_next_pass.swap(false, Ordering::AcqRel) {
            panic!("owner loop failure");
        }

        if !shared.registry.wait(Some(shared.poll_timeout)) {
            continue;
        }

        let connections = shared.registry.snapshot();
        for endpoint in shared.selector.select(&connections, Some(shared.poll_timeout)) {
            if endpoint.is_closed() {
                shared.registry.remove(endpoint.id());
                shared.stats.connection_closed();
                debug!(conn = %endpoint.id(), "connection closed");
                continue;
            }
            handle_request(shared, &mut handler, &endpoint);
        }
    }
}

/// Answers the next pending request on `endpoint`, if there is one.
fn handle_request(shared: &Shared, handler: &mut CommandHandler, endpoint: &ServerEndpoint) {
    let request = match endpoint.try_recv() {
        Ok(request) => request,
        Err(ChannelError::Empty) | Err(ChannelError::Closed) | Err(ChannelError::Timeout) => return,
    };

    trace!(conn = %endpoint.id(), ?request, "dispatching request");
    let response = handler.execute(request);
    shared.stats.request_handled(&response);

    if endpoint.send(response).is_err() {
        trace!(conn = %endpoint.id(), "caller went away before the reply");
    }
}

// ============================================================================
// Tests
// ============================================================================
