//! Pool-facing lifecycle contract

use crate::connection::Connection;
use crate::Result;
use async_trait::async_trait;

/// The contract a generic resource pool drives.
///
/// One implementor feeds one pool: the pool calls [`create`] to grow,
/// [`validate`] before lending out an idle connection, and [`destroy`] on
/// eviction. The pool never touches connection internals and never sees a
/// connection whose handshake did not complete.
///
/// [`create`]: ConnectionLifecycle::create
/// [`validate`]: ConnectionLifecycle::validate
/// [`destroy`]: ConnectionLifecycle::destroy
#[async_trait]
pub trait ConnectionLifecycle: Send + Sync {
    /// Connection type managed by this lifecycle
    type Conn: Connection;

    /// Produce a ready-to-use connection: opened, greeted, handshaken.
    ///
    /// One attempt per call. On failure the implementor applies its
    /// backoff before the error surfaces, throttling pools that retry
    /// eagerly.
    async fn create(&self) -> Result<Self::Conn>;

    /// Tear a connection down and release its listeners.
    ///
    /// Destroying a connection that already closed is not an error.
    async fn destroy(&self, conn: Self::Conn) -> Result<()>;

    /// Report whether the connection still believes it is live.
    ///
    /// A plain flag read: no I/O, no side effects. A half-dead socket
    /// whose drop was never observed still validates true.
    fn validate(&self, conn: &Self::Conn) -> bool;
}
