//! Handshake injection point

use crate::connection::Connection;
use crate::protocol::Greeting;
use crate::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;

/// Application-level handshake, run once per successful open.
///
/// The factory establishes the transport and reads the greeting;
/// everything the server requires before a connection counts as usable
/// happens here, speaking through the connection's own protocol surface.
/// The resolved identifier is logged and then dropped: implementations
/// usually have one, the factory does not need it.
#[async_trait]
pub trait Handshake<C: Connection>: Send + Sync {
    /// Identify against the server.
    ///
    /// The connection is past its greeting and in the handshaking state.
    /// An error here fails the whole creation attempt.
    async fn handshake(&self, conn: &mut C, greeting: &Greeting) -> Result<String>;
}

/// Adapter turning a closure into a [`Handshake`].
///
/// For handshakes that do not warrant a named type. Annotate the
/// closure's argument types; the boxed return needs no cast:
///
/// ```
/// use queuewire::{
///     BackoffPolicy, ConnectionFactory, Greeting, HandshakeFn, TcpBinder, TcpConnection,
/// };
///
/// # fn run() -> queuewire::Result<()> {
/// let handshake = HandshakeFn::new(|conn: &mut TcpConnection, _greeting: &Greeting| {
///     Box::pin(async move {
///         conn.send_line("HELLO {\"hostname\":\"worker-a\",\"v\":2}").await?;
///         conn.read_line().await?;
///         conn.finish_handshake()?;
///         Ok("worker-a".to_string())
///     })
/// });
///
/// let factory = ConnectionFactory::new(
///     TcpBinder::new("queue.internal:7419".parse()?),
///     handshake,
///     BackoffPolicy::default(),
/// );
/// # let _ = factory;
/// # Ok(())
/// # }
/// ```
pub struct HandshakeFn<F>(F);

impl<F> HandshakeFn<F> {
    /// Wrap a closure as a handshake.
    ///
    /// The bound sits here rather than on the struct: a closure literal
    /// only infers the borrowed higher-ranked signature when the
    /// constructor call expects it.
    pub fn new<C>(f: F) -> Self
    where
        C: Connection,
        F: for<'a> Fn(&'a mut C, &'a Greeting) -> BoxFuture<'a, Result<String>> + Send + Sync,
    {
        Self(f)
    }
}

#[async_trait]
impl<C, F> Handshake<C> for HandshakeFn<F>
where
    C: Connection,
    F: for<'a> Fn(&'a mut C, &'a Greeting) -> BoxFuture<'a, Result<String>> + Send + Sync,
{
    async fn handshake(&self, conn: &mut C, greeting: &Greeting) -> Result<String> {
        (self.0)(conn, greeting).await
    }
}
