//! Command Handler Module
//!
//! Executes [`Request`]s against the [`Store`] and produces exactly one
//! [`Response`] per request. The handler owns the store outright; it lives
//! on the server's owner thread and is never shared.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │  execute()  │───>│  dispatch() │───>│    Store    │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │         │                                                   │
//! │         ├──> read_attribute()                               │
//! │         └──> write_attribute()                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::commands::request::{Attribute, AttributeValue, Command, Reply, Request, Response};
use crate::storage::{Store, StoreError};
use tracing::trace;

/// Dispatches requests onto the store it owns.
#[derive(Debug, Default)]
pub struct CommandHandler {
    store: Store,
}

impl CommandHandler {
    /// Creates a handler that owns `store`.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Executes one request and returns its response.
    ///
    /// Store errors become [`Response::Error`]; nothing here panics or
    /// aborts the caller's loop.
    ///
    /// # Example
    ///
    /// ```
    /// use solokv::commands::{Command, CommandHandler, Reply, Request, Response};
    /// use solokv::storage::{Store, Value};
    ///
    /// let mut handler = CommandHandler::new(Store::new());
    /// let set = Command::Set { key: "a".into(), value: Value::from(1), ttl: None };
    /// assert_eq!(handler.execute(Request::Call(set)), Response::Return(Reply::Bool(true)));
    /// ```
    pub fn execute(&mut self, request: Request) -> Response {
        match request {
            Request::Call(command) => {
                trace!(command = command.name(), "executing command");
                self.dispatch(command).into()
            }
            Request::Get(attribute) => Response::Return(self.read_attribute(attribute)),
            Request::Set(update) => self.write_attribute(update).map(|()| Reply::Unit).into(),
        }
    }

    /// Runs a store operation.
    pub fn dispatch(&mut self, command: Command) -> Result<Reply, StoreError> {
        let store = &mut self.store;
        let reply = match command {
            Command::Get { key } => Reply::Value(store.get(&key)),
            Command::Set { key, value, ttl } => Reply::Bool(store.set(key, value, ttl)?),
            Command::SetNx { key, value, ttl } => Reply::Bool(store.setnx(key, value, ttl)?),
            Command::MGet { keys } => Reply::Values(store.mget(keys.as_slice())),
            Command::MSet { data, ttl } => Reply::Bool(store.mset(data, ttl)?),
            Command::MSetNx { data, ttl } => Reply::Count(store.msetnx(data, ttl)?),
            Command::Delete { keys } => Reply::Count(store.delete(keys.as_slice())),
            Command::Exists { key } => Reply::Bool(store.exists(&key)),
            Command::Keys => Reply::Keys(store.keys()),
            Command::Ttl { key } => Reply::Integer(store.ttl(&key)),
            Command::Pttl { key } => Reply::Integer(store.pttl(&key)),
            Command::Incr { key, amount, ttl } => Reply::Integer(store.incr(&key, amount, ttl)?),
            Command::Decr { key, amount, ttl } => Reply::Integer(store.decr(&key, amount, ttl)?),
            Command::Expire { key, ttl, nx, xx } => Reply::Bool(store.expire(&key, ttl, nx, xx)?),
            Command::Persist { key } => Reply::Bool(store.persist(&key)),
            Command::FlushDb => {
                store.flushdb();
                Reply::Unit
            }
        };
        Ok(reply)
    }

    fn read_attribute(&self, attribute: Attribute) -> Reply {
        match attribute {
            Attribute::Empty => Reply::Bool(self.store.is_empty()),
            Attribute::Len => Reply::Count(self.store.len()),
            Attribute::DefaultTtl => Reply::Ttl(self.store.default_ttl()),
            Attribute::Stats => Reply::Stats(self.store.stats()),
        }
    }

    fn write_attribute(&mut self, update: AttributeValue) -> Result<(), StoreError> {
        match update {
            AttributeValue::DefaultTtl(ttl) => self.store.set_default_ttl(ttl),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;
    use std::time::Duration;

    fn call(handler: &mut CommandHandler, command: Command) -> Response {
        handler.execute(Request::Call(command))
    }

    fn ok(reply: Reply) -> Response {
        Response::Return(reply)
    }

    #[test]
    fn test_set_get() {
        let mut handler = CommandHandler::default();

        let set = Command::Set {
            key: "key".into(),
            value: Value::from("value"),
            ttl: None,
        };
        assert_eq!(call(&mut handler, set), ok(Reply::Bool(true)));
        assert_eq!(
            call(&mut handler, Command::Get { key: "key".into() }),
            ok(Reply::Value(Some(Value::from("value"))))
        );
    }

    #[test]
    fn test_get_nonexistent() {
        let mut handler = CommandHandler::default();
        assert_eq!(
            call(&mut handler, Command::Get { key: "nope".into() }),
            ok(Reply::Value(None))
        );
    }

    #[test]
    fn test_incr_then_get() {
        let mut handler = CommandHandler::default();
        let set = Command::Set {
            key: "a".into(),
            value: Value::from(1),
            ttl: None,
        };
        call(&mut handler, set);

        let incr = Command::Incr {
            key: "a".into(),
            amount: 5,
            ttl: None,
        };
        assert_eq!(call(&mut handler, incr), ok(Reply::Integer(6)));
        assert_eq!(
            call(&mut handler, Command::Get { key: "a".into() }),
            ok(Reply::Value(Some(Value::Int(6))))
        );
    }

    #[test]
    fn test_store_error_becomes_error_response() {
        let mut handler = CommandHandler::default();
        call(
            &mut handler,
            Command::Set {
                key: "s".into(),
                value: Value::from("text"),
                ttl: None,
            },
        );

        let incr = Command::Incr {
            key: "s".into(),
            amount: 1,
            ttl: None,
        };
        assert_eq!(
            call(&mut handler, incr),
            Response::Error(StoreError::NotAnInteger("str"))
        );

        let expire = Command::Expire {
            key: "s".into(),
            ttl: Duration::from_secs(1),
            nx: true,
            xx: true,
        };
        assert_eq!(
            call(&mut handler, expire),
            Response::Error(StoreError::ConflictingFlags)
        );
    }

    #[test]
    fn test_mset_mget_delete() {
        let mut handler = CommandHandler::default();
        let mset = Command::MSet {
            data: vec![("a".into(), Value::from(1)), ("b".into(), Value::from(2))],
            ttl: None,
        };
        assert_eq!(call(&mut handler, mset), ok(Reply::Bool(true)));

        let mget = Command::MGet {
            keys: vec!["a".into(), "x".into(), "b".into()],
        };
        assert_eq!(
            call(&mut handler, mget),
            ok(Reply::Values(vec![Some(Value::Int(1)), None, Some(Value::Int(2))]))
        );

        let delete = Command::Delete {
            keys: vec!["a".into(), "x".into()],
        };
        assert_eq!(call(&mut handler, delete), ok(Reply::Count(1)));
        assert_eq!(call(&mut handler, Command::Keys), ok(Reply::Keys(vec!["b".into()])));
    }

    #[test]
    fn test_attributes() {
        let mut handler = CommandHandler::default();
        assert_eq!(handler.execute(Request::Get(Attribute::Empty)), ok(Reply::Bool(true)));
        assert_eq!(handler.execute(Request::Get(Attribute::DefaultTtl)), ok(Reply::Ttl(None)));

        let ttl = Some(Duration::from_secs(30));
        assert_eq!(
            handler.execute(Request::Set(AttributeValue::DefaultTtl(ttl))),
            ok(Reply::Unit)
        );
        assert_eq!(handler.execute(Request::Get(Attribute::DefaultTtl)), ok(Reply::Ttl(ttl)));

        call(
            &mut handler,
            Command::Set {
                key: "k".into(),
                value: Value::from(1),
                ttl: None,
            },
        );
        assert_eq!(handler.execute(Request::Get(Attribute::Len)), ok(Reply::Count(1)));
        assert!(handler.store_mut().ttl("k") > 0);
    }

    #[test]
    fn test_zero_default_ttl_rejected() {
        let mut handler = CommandHandler::default();
        assert_eq!(
            handler.execute(Request::Set(AttributeValue::DefaultTtl(Some(Duration::ZERO)))),
            Response::Error(StoreError::InvalidTtl)
        );
    }

    #[test]
    fn test_huge_parsed_ttl_becomes_error_response() {
        let mut handler = CommandHandler::default();
        let args = vec![Value::from("k"), Value::from(1), Value::Int(i64::MAX)];
        let set = Command::parse("set", args).unwrap();
        assert_eq!(call(&mut handler, set), Response::Error(StoreError::InvalidTtl));

        let args = vec![Value::from("k"), Value::Int(1), Value::Float(1e15)];
        let incr = Command::parse("incr", args).unwrap();
        assert_eq!(call(&mut handler, incr), Response::Error(StoreError::InvalidTtl));
        assert_eq!(handler.execute(Request::Get(Attribute::Empty)), ok(Reply::Bool(true)));
    }

    #[test]
    fn test_flushdb() {
        let mut handler = CommandHandler::default();
        call(
            &mut handler,
            Command::Set {
                key: "k".into(),
                value: Value::from(1),
                ttl: None,
            },
        );
        assert_eq!(call(&mut handler, Command::FlushDb), ok(Reply::Unit));
        assert_eq!(handler.execute(Request::Get(Attribute::Empty)), ok(Reply::Bool(true)));
    }
}
