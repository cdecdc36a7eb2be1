//! Error types

use std::time::Duration;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by connection creation, teardown, and the line protocol.
///
/// The factory does not branch on the variant: every creation-path failure
/// drives the same backoff-and-reraise path. The variants exist so callers
/// and the error sink can tell a refused socket from a rejected handshake.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TCP establishment exceeded the configured connect timeout
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The remote side closed the connection
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Malformed or unexpected data on the wire
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The application-level handshake was rejected or could not complete
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Invalid configuration (endpoint, TLS material, hostname)
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation attempted in a connection state that does not allow it
    #[error("invalid connection state: expected {expected}, got {actual}")]
    InvalidState {
        /// What the operation required
        expected: String,
        /// The state the connection was actually in
        actual: String,
    },
}
