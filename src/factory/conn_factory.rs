//! Connection factory
//!
//! One factory feeds one pool. Creation opens the transport, reads the
//! greeting, and runs the injected handshake; failures increment a shared
//! attempt counter and sleep out a linear backoff before the error
//! surfaces, so a pool that retries eagerly is throttled without any
//! retry loop in here.

use super::backoff::BackoffPolicy;
use super::config::FactoryConfig;
use super::handshake::Handshake;
use super::lifecycle::ConnectionLifecycle;
use crate::connection::{Bind, Connection, ErrorSink, TcpBinder, TcpConnection};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Creates, validates, and destroys pooled connections.
///
/// Holds the binder that constructs connections, the handshake to run on
/// each of them, and the consecutive-failure count shared across every
/// concurrent `create` call. The error sink installed on new connections
/// can be replaced at any time; the default logs at error level.
pub struct ConnectionFactory<B: Bind, H> {
    binder: B,
    handshake: H,
    backoff: BackoffPolicy,
    attempts: AtomicU32,
    error_sink: RwLock<ErrorSink>,
}

impl<B, H> ConnectionFactory<B, H>
where
    B: Bind,
    H: Handshake<B::Conn>,
{
    /// Factory over an arbitrary binder and handshake
    pub fn new(binder: B, handshake: H, backoff: BackoffPolicy) -> Self {
        Self {
            binder,
            handshake,
            backoff,
            attempts: AtomicU32::new(0),
            error_sink: RwLock::new(default_error_sink()),
        }
    }

    /// Replace the sink installed on connections created from now on.
    ///
    /// Connections already handed out keep the sink they were given.
    pub fn set_error_sink(&self, sink: ErrorSink) {
        *self.error_sink.write() = sink;
    }

    /// Consecutive failed creation attempts since the last success
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Create a ready-to-use connection.
    ///
    /// One attempt: bind, install the error sink, open, handshake. On
    /// success the failure count resets to zero. On failure the count is
    /// bumped, the backoff delay for the new count is slept out in full,
    /// and the original error is re-raised. The failed connection is not
    /// closed here: it never reached the pool, and dropping it releases
    /// the transport.
    pub async fn create(&self) -> Result<B::Conn> {
        let span = tracing::debug_span!("create");
        async {
            tracing::debug!(grow = 1, "creating pool connection");
            crate::metrics::counters::create_attempted();

            let mut conn = self.binder.bind();
            // Sink goes in before any I/O so opening errors reach it
            conn.set_error_sink(self.error_sink.read().clone());

            match self.open_and_identify(&mut conn).await {
                Ok(()) => {
                    self.attempts.store(0, Ordering::Relaxed);
                    crate::metrics::counters::create_succeeded();
                    Ok(conn)
                }
                Err((stage, err)) => {
                    let attempts = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    let delay = self.backoff.delay(attempts);
                    crate::metrics::counters::create_failed(stage);
                    crate::metrics::histograms::backoff_delay(delay.as_millis() as u64);
                    tracing::debug!(
                        attempts,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "connection creation failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Tear the connection down.
    ///
    /// Close completes first; only then are the listeners dropped, so a
    /// sink stays reachable for errors surfacing during shutdown.
    pub async fn destroy(&self, mut conn: B::Conn) -> Result<()> {
        let result = conn.close().await;
        conn.clear_listeners();
        crate::metrics::counters::connection_destroyed();
        tracing::debug!("connection destroyed");
        result
    }

    /// The connection's current liveness flag, read without I/O
    pub fn validate(&self, conn: &B::Conn) -> bool {
        conn.connected()
    }

    async fn open_and_identify(
        &self,
        conn: &mut B::Conn,
    ) -> std::result::Result<(), (&'static str, Error)> {
        let greeting = conn
            .open()
            .await
            .map_err(|e| (crate::metrics::labels::STAGE_OPEN, e))?;

        let started = Instant::now();
        let identifier = self
            .handshake
            .handshake(conn, &greeting)
            .await
            .map_err(|e| (crate::metrics::labels::STAGE_HANDSHAKE, e))?;
        crate::metrics::histograms::handshake_duration(started.elapsed().as_millis() as u64);
        tracing::debug!(identifier = %identifier, "handshake complete");
        Ok(())
    }
}

impl<H> ConnectionFactory<TcpBinder, H>
where
    H: Handshake<TcpConnection>,
{
    /// Stock TCP factory from a configuration
    pub fn from_config(config: FactoryConfig, handshake: H) -> Self {
        let FactoryConfig {
            endpoint,
            tls,
            connect_timeout,
            backoff,
        } = config;

        let mut binder = TcpBinder::new(endpoint);
        if let Some(tls) = tls {
            binder = binder.tls(tls);
        }
        if let Some(timeout) = connect_timeout {
            binder = binder.connect_timeout(timeout);
        }
        Self::new(binder, handshake, backoff)
    }
}

#[async_trait]
impl<B, H> ConnectionLifecycle for ConnectionFactory<B, H>
where
    B: Bind,
    H: Handshake<B::Conn>,
{
    type Conn = B::Conn;

    async fn create(&self) -> Result<B::Conn> {
        ConnectionFactory::create(self).await
    }

    async fn destroy(&self, conn: B::Conn) -> Result<()> {
        ConnectionFactory::destroy(self, conn).await
    }

    fn validate(&self, conn: &B::Conn) -> bool {
        ConnectionFactory::validate(self, conn)
    }
}

fn default_error_sink() -> ErrorSink {
    Arc::new(|err: &Error| {
        tracing::error!(error = %err, "connection error");
    })
}
