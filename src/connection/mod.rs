//! Connection management
//!
//! This module handles:
//! * The [`Connection`] and [`Bind`] contracts the factory drives
//! * The stock TCP implementation with optional TLS
//! * State machine enforcement across the connection lifecycle
//! * TLS configuration and endpoint addressing

mod conn;
mod endpoint;
mod state;
mod tcp;
mod tls;
mod transport;

pub use conn::{Bind, CloseHook, Connection, ErrorSink};
pub use endpoint::Endpoint;
pub use state::ConnectionState;
pub use tcp::{TcpBinder, TcpConnection};
pub use tls::{parse_server_name, TlsConfig, TlsConfigBuilder};
pub use transport::Transport;
