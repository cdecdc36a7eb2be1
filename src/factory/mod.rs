//! Connection factory and its collaborator contracts
//!
//! This module handles:
//! * The create/destroy/validate lifecycle a resource pool drives
//! * Failure counting and the linear backoff ramp
//! * Handshake injection and the pool-facing trait
//! * Factory configuration

mod backoff;
mod config;
mod conn_factory;
mod handshake;
mod lifecycle;

pub use backoff::BackoffPolicy;
pub use config::{FactoryConfig, FactoryConfigBuilder};
pub use conn_factory::ConnectionFactory;
pub use handshake::{Handshake, HandshakeFn};
pub use lifecycle::ConnectionLifecycle;
