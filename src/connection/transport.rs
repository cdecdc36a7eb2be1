//! Transport abstraction (plain TCP or TLS from the first byte)
//!
//! The job-server protocol never upgrades mid-stream: whether a connection
//! is encrypted is decided by configuration before dialing.

use super::endpoint::Endpoint;
use crate::{Error, Result};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Established byte stream to the server: plain or TLS-encrypted
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    /// Plain TCP connection
    Plain(TcpStream),
    /// TLS-encrypted TCP connection
    Tls(tokio_rustls::client::TlsStream<TcpStream>),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Plain(_) => f.write_str("Transport::Plain(TcpStream)"),
            Transport::Tls(_) => f.write_str("Transport::Tls(TlsStream)"),
        }
    }
}

impl Transport {
    /// Connect via plain TCP, optionally bounded by a connect timeout
    pub async fn connect(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<Self> {
        let stream = dial(endpoint, timeout).await?;
        Ok(Transport::Plain(stream))
    }

    /// Connect via TCP and complete a TLS handshake before returning
    pub async fn connect_tls(
        endpoint: &Endpoint,
        tls_config: &super::TlsConfig,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let tcp_stream = dial(endpoint, timeout).await?;

        // Server name for SNI and certificate verification
        let server_name = super::parse_server_name(&endpoint.host)?;
        let server_name = rustls_pki_types::ServerName::try_from(server_name).map_err(|_| {
            Error::Config(format!("invalid hostname for TLS: {}", endpoint.host))
        })?;

        let tls_connector = tokio_rustls::TlsConnector::from(tls_config.client_config());
        let tls_stream = tls_connector
            .connect(server_name, tcp_stream)
            .await
            .map_err(|e| Error::Config(format!("TLS handshake failed: {}", e)))?;

        Ok(Transport::Tls(tls_stream))
    }

    /// Write all bytes to the stream
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.write_all(buf).await?,
            Transport::Tls(stream) => stream.write_all(buf).await?,
        }
        Ok(())
    }

    /// Flush the stream
    pub async fn flush(&mut self) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.flush().await?,
            Transport::Tls(stream) => stream.flush().await?,
        }
        Ok(())
    }

    /// Read into the buffer, returning the number of bytes read
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let n = match self {
            Transport::Plain(stream) => stream.read_buf(buf).await?,
            Transport::Tls(stream) => stream.read_buf(buf).await?,
        };
        Ok(n)
    }

    /// Shut down the stream
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.shutdown().await?,
            Transport::Tls(stream) => stream.shutdown().await?,
        }
        Ok(())
    }
}

async fn dial(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<TcpStream> {
    let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
    match timeout {
        Some(limit) => tokio::time::timeout(limit, connect)
            .await
            .map_err(|_| Error::ConnectTimeout(limit))?
            .map_err(Error::from),
        None => connect.await.map_err(Error::from),
    }
}
