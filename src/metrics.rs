//! Metrics instrumentation
//!
//! Thin wrappers around the `metrics` facade so call sites stay terse and
//! metric names live in one place. Recording is a no-op unless the host
//! application installs a recorder.

/// Label values shared across metrics
pub mod labels {
    /// Creation failed while opening the transport or reading the greeting
    pub const STAGE_OPEN: &str = "open";
    /// Creation failed during the injected handshake
    pub const STAGE_HANDSHAKE: &str = "handshake";
}

/// Counter metrics
pub mod counters {
    /// A connection creation attempt started (pool growth +1)
    pub fn create_attempted() {
        metrics::counter!("queuewire_create_attempts_total").increment(1);
    }

    /// A connection was fully opened and handshaken
    pub fn create_succeeded() {
        metrics::counter!("queuewire_create_success_total").increment(1);
    }

    /// A creation attempt failed at the given stage
    pub fn create_failed(stage: &'static str) {
        metrics::counter!("queuewire_create_failures_total", "stage" => stage).increment(1);
    }

    /// A connection was torn down through destroy()
    pub fn connection_destroyed() {
        metrics::counter!("queuewire_destroyed_total").increment(1);
    }

    /// An out-of-band connection error reached the error sink
    pub fn connection_error() {
        metrics::counter!("queuewire_connection_errors_total").increment(1);
    }
}

/// Histogram metrics
pub mod histograms {
    /// Time from bind to greeting received, milliseconds
    pub fn open_duration(ms: u64) {
        metrics::histogram!("queuewire_open_duration_ms").record(ms as f64);
    }

    /// Time spent in the injected handshake, milliseconds
    pub fn handshake_duration(ms: u64) {
        metrics::histogram!("queuewire_handshake_duration_ms").record(ms as f64);
    }

    /// Backoff imposed before re-raising a creation failure, milliseconds
    pub fn backoff_delay(ms: u64) {
        metrics::histogram!("queuewire_backoff_delay_ms").record(ms as f64);
    }
}
