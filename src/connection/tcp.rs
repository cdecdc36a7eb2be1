//! TCP connection to the job server
//!
//! Stock [`Connection`] implementation: tokio TCP with optional TLS,
//! buffered CRLF line I/O, and state-machine enforcement of the
//! open/handshake/close lifecycle. TLS is decided up front from the
//! binder's configuration; the job-server protocol encrypts from the
//! first byte, so there is no upgrade step.

use super::conn::{Bind, CloseHook, Connection, ErrorSink};
use super::endpoint::Endpoint;
use super::state::ConnectionState;
use super::tls::TlsConfig;
use super::transport::Transport;
use crate::protocol::{self, Greeting};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use parking_lot::{Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Error sink and close hooks registered on a connection.
///
/// Registration goes through `&self` so the factory can install listeners
/// on a connection it is about to hand elsewhere; the locks are held only
/// for the registry operation itself, never across I/O.
#[derive(Default)]
struct Listeners {
    error_sink: RwLock<Option<ErrorSink>>,
    close_hooks: Mutex<Vec<CloseHook>>,
}

impl Listeners {
    fn emit_error(&self, err: &Error) {
        crate::metrics::counters::connection_error();
        let sink = self.error_sink.read().clone();
        match sink {
            Some(sink) => sink(err),
            None => tracing::error!(error = %err, "connection error with no sink installed"),
        }
    }

    /// Run and drop every close hook. Hooks are one-shot, so a second
    /// call is a no-op.
    fn fire_close(&self) {
        let hooks = std::mem::take(&mut *self.close_hooks.lock());
        for hook in hooks {
            hook();
        }
    }

    fn clear(&self) {
        *self.error_sink.write() = None;
        self.close_hooks.lock().clear();
    }
}

/// A line-protocol connection over TCP, plain or TLS.
pub struct TcpConnection {
    endpoint: Endpoint,
    tls: Option<TlsConfig>,
    connect_timeout: Option<Duration>,
    state: ConnectionState,
    transport: Option<Transport>,
    read_buf: BytesMut,
    listeners: Listeners,
}

impl TcpConnection {
    /// Construct an unopened connection. No I/O happens until
    /// [`open`](Connection::open).
    pub fn new(
        endpoint: Endpoint,
        tls: Option<TlsConfig>,
        connect_timeout: Option<Duration>,
    ) -> Self {
        Self {
            endpoint,
            tls,
            connect_timeout,
            state: ConnectionState::Unopened,
            transport: None,
            read_buf: BytesMut::with_capacity(4096),
            listeners: Listeners::default(),
        }
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The remote endpoint this connection is bound to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send one protocol line (CRLF appended). Failures are reported to
    /// the error sink and mark the connection dead.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        match self.send_line_raw(line).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Read one protocol line, without its CRLF terminator. Failures are
    /// reported to the error sink and mark the connection dead.
    pub async fn read_line(&mut self) -> Result<String> {
        match self.read_line_raw().await {
            Ok(line) => Ok(line),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Mark the handshake complete. Called by handshake implementations
    /// once the server has accepted the identification exchange.
    pub fn finish_handshake(&mut self) -> Result<()> {
        self.state.transition(ConnectionState::Ready)
    }

    /// Connect the transport and read the banner
    async fn establish(&mut self) -> Result<Greeting> {
        let transport = match &self.tls {
            Some(tls) => {
                Transport::connect_tls(&self.endpoint, tls, self.connect_timeout).await?
            }
            None => Transport::connect(&self.endpoint, self.connect_timeout).await?,
        };
        self.transport = Some(transport);

        let banner = self.read_line_raw().await?;
        Greeting::parse(&banner)
    }

    async fn send_line_raw(&mut self, line: &str) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
        transport.write_all(line.as_bytes()).await?;
        transport.write_all(b"\r\n").await?;
        transport.flush().await?;
        Ok(())
    }

    async fn read_line_raw(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = find_crlf(&self.read_buf) {
                let line = self.read_buf.split_to(pos);
                self.read_buf.advance(2);
                return String::from_utf8(line.to_vec())
                    .map_err(|_| Error::Protocol("non-UTF-8 line from server".into()));
            }

            if self.read_buf.len() > protocol::MAX_LINE_LEN {
                return Err(Error::Protocol(format!(
                    "line exceeds {} bytes without terminator",
                    protocol::MAX_LINE_LEN
                )));
            }

            let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
            let n = transport.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    /// Record a wire-level failure: notify the sink, settle the state,
    /// and hand the error back for propagation.
    ///
    /// Creation-path failures land in `Failed`; a connection that had
    /// reached `Ready` goes to `Closed` and fires its close hooks.
    fn fail(&mut self, err: Error) -> Error {
        match self.state {
            ConnectionState::Opening | ConnectionState::Handshaking => {
                let _ = self.state.transition(ConnectionState::Failed);
            }
            ConnectionState::Ready => {
                let _ = self.state.transition(ConnectionState::Closed);
                self.transport = None;
                self.listeners.fire_close();
            }
            _ => {}
        }
        self.listeners.emit_error(&err);
        err
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn open(&mut self) -> Result<Greeting> {
        let span = tracing::debug_span!("open", endpoint = %self.endpoint);
        async {
            self.state.transition(ConnectionState::Opening)?;
            let started = Instant::now();

            match self.establish().await {
                Ok(greeting) => {
                    self.state.transition(ConnectionState::Handshaking)?;
                    crate::metrics::histograms::open_duration(
                        started.elapsed().as_millis() as u64
                    );
                    if greeting.version > protocol::PROTOCOL_VERSION {
                        tracing::warn!(
                            server_version = greeting.version,
                            client_version = protocol::PROTOCOL_VERSION,
                            "server speaks a newer protocol version"
                        );
                    }
                    tracing::debug!(version = greeting.version, "greeting received");
                    Ok(greeting)
                }
                Err(err) => Err(self.fail(err)),
            }
        }
        .instrument(span)
        .await
    }

    async fn close(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.state.transition(ConnectionState::Closing)?;

        if let Some(mut transport) = self.transport.take() {
            // Best-effort goodbye: the server hanging up first is fine
            let _ = transport.write_all(protocol::verbs::END.as_bytes()).await;
            let _ = transport.write_all(b"\r\n").await;
            let _ = transport.flush().await;
            let _ = transport.shutdown().await;
        }

        self.state.transition(ConnectionState::Closed)?;
        self.listeners.fire_close();
        tracing::debug!(endpoint = %self.endpoint, "connection closed");
        Ok(())
    }

    fn connected(&self) -> bool {
        self.state.is_open()
    }

    fn set_error_sink(&self, sink: ErrorSink) {
        *self.listeners.error_sink.write() = Some(sink);
    }

    fn on_close(&self, hook: CloseHook) {
        self.listeners.close_hooks.lock().push(hook);
    }

    fn clear_listeners(&self) {
        self.listeners.clear();
    }
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Produces [`TcpConnection`]s bound to a fixed endpoint.
///
/// The factory holds one binder per pool; every bind yields a fresh
/// unopened connection carrying the same endpoint, TLS, and timeout.
#[derive(Debug, Clone)]
pub struct TcpBinder {
    endpoint: Endpoint,
    tls: Option<TlsConfig>,
    connect_timeout: Option<Duration>,
}

impl TcpBinder {
    /// Binder for plain TCP connections
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            tls: None,
            connect_timeout: None,
        }
    }

    /// Enable TLS with the given configuration
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Bound the TCP connect phase
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

impl Bind for TcpBinder {
    type Conn = TcpConnection;

    fn bind(&self) -> TcpConnection {
        TcpConnection::new(self.endpoint.clone(), self.tls.clone(), self.connect_timeout)
    }
}
