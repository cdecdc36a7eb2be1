//! Pooled connection lifecycle for job-queue servers
//!
//! `queuewire` sits between a generic resource pool and a remote
//! job-queue server: it creates connections on demand, runs the
//! identification handshake before a connection counts as usable, backs
//! off on consecutive failures, validates idle connections with a cheap
//! flag read, and tears connections down on eviction.
//!
//! # Example
//!
//! ```no_run
//! use queuewire::{ConnectionFactory, FactoryConfig, HelloHandshake};
//! use std::time::Duration;
//!
//! # async fn run() -> queuewire::Result<()> {
//! let config = FactoryConfig::builder("queue.internal:7419".parse()?)
//!     .connect_timeout(Duration::from_secs(10))
//!     .build();
//! let factory = ConnectionFactory::from_config(config, HelloHandshake::worker());
//!
//! let conn = factory.create().await?;
//! assert!(factory.validate(&conn));
//! factory.destroy(conn).await?;
//! # Ok(())
//! # }
//! ```
//!
//! The factory performs no pooling itself: pair it with any pool that
//! drives the [`ConnectionLifecycle`] contract. Connection multiplexing,
//! job scheduling, and pool sizing live elsewhere.

pub mod connection;
mod error;
pub mod factory;
pub mod metrics;
pub mod protocol;

pub use connection::{
    Bind, CloseHook, Connection, ConnectionState, Endpoint, ErrorSink, TcpBinder, TcpConnection,
    TlsConfig,
};
pub use error::{Error, Result};
pub use factory::{
    BackoffPolicy, ConnectionFactory, ConnectionLifecycle, FactoryConfig, Handshake, HandshakeFn,
};
pub use protocol::{Greeting, HelloHandshake};
