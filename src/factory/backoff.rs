//! Failure backoff policy

use std::time::Duration;

/// Linear backoff ramp driven by the consecutive-failure count.
///
/// The delay after the Nth consecutive failure is `min(N, cap) * step`:
/// with the defaults the first failure waits 200 ms, the ramp grows by
/// 200 ms per failure, and from the 20th failure onward every wait is
/// 4000 ms. The count is the only input, so a pool retrying eagerly is
/// throttled harder the longer the server stays unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay added per consecutive failure
    pub step: Duration,

    /// Failure count beyond which the delay stops growing
    pub cap: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(200),
            cap: 20,
        }
    }
}

impl BackoffPolicy {
    /// Delay to apply after the `attempts`th consecutive failure
    pub fn delay(&self, attempts: u32) -> Duration {
        self.step * attempts.min(self.cap)
    }
}
