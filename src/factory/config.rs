//! Factory configuration

use super::backoff::BackoffPolicy;
use crate::connection::{Endpoint, TlsConfig};
use std::time::Duration;

/// Configuration for the stock TCP factory
///
/// Immutable once the factory is built. Use `FactoryConfig::builder()` to
/// set TLS, the connect timeout, or backoff knobs.
#[derive(Debug, Clone)]
pub struct FactoryConfig {
    /// Remote job-server address
    pub endpoint: Endpoint,
    /// TLS configuration; plain TCP when absent
    pub tls: Option<TlsConfig>,
    /// Bound on TCP establishment (default: none)
    pub connect_timeout: Option<Duration>,
    /// Backoff applied after failed creation attempts
    pub backoff: BackoffPolicy,
}

impl FactoryConfig {
    /// Plain-TCP configuration with default backoff
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            tls: None,
            connect_timeout: None,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = FactoryConfig::builder("queue.internal:7419".parse()?)
    ///     .connect_timeout(Duration::from_secs(10))
    ///     .backoff_step(Duration::from_millis(100))
    ///     .build();
    /// ```
    pub fn builder(endpoint: Endpoint) -> FactoryConfigBuilder {
        FactoryConfigBuilder {
            endpoint,
            tls: None,
            connect_timeout: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Builder for creating [`FactoryConfig`] with advanced options
#[derive(Debug, Clone)]
pub struct FactoryConfigBuilder {
    endpoint: Endpoint,
    tls: Option<TlsConfig>,
    connect_timeout: Option<Duration>,
    backoff: BackoffPolicy,
}

impl FactoryConfigBuilder {
    /// Enable TLS with the given configuration
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Set TCP connection timeout
    ///
    /// Default: None (no timeout)
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Set the per-failure backoff increment
    ///
    /// Default: 200 ms
    pub fn backoff_step(mut self, step: Duration) -> Self {
        self.backoff.step = step;
        self
    }

    /// Set the failure count at which the backoff delay stops growing
    ///
    /// Default: 20
    pub fn backoff_cap(mut self, cap: u32) -> Self {
        self.backoff.cap = cap;
        self
    }

    /// Build the configuration
    pub fn build(self) -> FactoryConfig {
        FactoryConfig {
            endpoint: self.endpoint,
            tls: self.tls,
            connect_timeout: self.connect_timeout,
            backoff: self.backoff,
        }
    }
}
