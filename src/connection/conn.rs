//! Connection contracts consumed by the factory
//!
//! The factory never touches sockets itself: it drives anything that
//! implements [`Connection`] and obtains fresh instances from a [`Bind`]
//! implementation. [`TcpConnection`](super::TcpConnection) is the stock
//! implementation; tests substitute scripted ones.

use crate::protocol::Greeting;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Observer for connection errors that occur outside any in-flight call.
///
/// Installed by the factory on every connection it creates, before any I/O,
/// so that even errors during opening are observable. Sinks borrow the
/// error: the same error may still be re-raised on the creation path.
pub type ErrorSink = Arc<dyn Fn(&Error) + Send + Sync>;

/// One-shot notification that a connection has closed.
pub type CloseHook = Box<dyn FnOnce() + Send>;

/// A pooled connection to the job server.
///
/// Implementations own the transport and the greeting exchange; everything
/// past the greeting (the identification handshake, job traffic) is
/// spoken by callers through whatever surface the concrete type offers.
/// Ownership is exclusive: the factory constructs a connection, hands it
/// to the pool on success, and receives it back for teardown. `open`,
/// `close`, and the listener operations are never called concurrently on
/// the same instance.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Establish the transport and return the server's greeting.
    ///
    /// Fails on connect errors, TLS errors, and a missing or malformed
    /// greeting. A failed open leaves the connection unusable; the factory
    /// drops it without calling [`close`](Connection::close).
    async fn open(&mut self) -> Result<Greeting>;

    /// Release the transport. Idempotent: closing an already-closed
    /// connection must return `Ok`.
    async fn close(&mut self) -> Result<()>;

    /// Current liveness flag. Never performs I/O, so a socket that died
    /// without the connection noticing still reports `true`.
    fn connected(&self) -> bool;

    /// Install the sink for out-of-band errors, replacing any previous one.
    fn set_error_sink(&self, sink: ErrorSink);

    /// Register a hook invoked once when the connection closes.
    fn on_close(&self, hook: CloseHook);

    /// Drop the error sink and every close hook.
    fn clear_listeners(&self);
}

/// Produces unopened connections bound to a fixed remote endpoint.
///
/// Binding performs no I/O: it only constructs the connection object, so
/// the factory can install its error sink before the first byte moves.
pub trait Bind: Send + Sync {
    /// The connection type this binder produces
    type Conn: Connection;

    /// Construct a new unopened connection
    fn bind(&self) -> Self::Conn;
}
