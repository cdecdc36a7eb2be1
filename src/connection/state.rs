//! Connection state machine

use crate::{Error, Result};

/// Connection state as seen by the factory lifecycle.
///
/// `Failed` is terminal and only reachable from the creation path
/// (opening or handshaking); a connection that dies after reaching
/// `Ready` goes straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, no I/O performed yet
    Unopened,

    /// Transport establishment in progress (TCP/TLS connect, greeting read)
    Opening,

    /// Greeting received, application-level handshake pending or in progress
    Handshaking,

    /// Handshake complete, lendable by the pool
    Ready,

    /// close() initiated, shutdown in progress
    Closing,

    /// Transport released
    Closed,

    /// Creation failed during opening or handshaking (terminal)
    Failed,
}

impl ConnectionState {
    /// Check if a transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Unopened, Opening)
                | (Opening, Handshaking)
                | (Handshaking, Ready)
                | (Opening, Failed)
                | (Handshaking, Failed)
                | (Unopened, Closing)
                | (Opening, Closing)
                | (Handshaking, Closing)
                | (Ready, Closing)
                | (Closing, Closed)
                | (Ready, Closed)
        )
    }

    /// Transition to a new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {}", self),
                actual: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }

    /// Whether the transport is up: the `connected` liveness flag.
    ///
    /// True once the greeting has been received and until close or death
    /// is observed. A silently dropped socket keeps reporting true; there
    /// is no probing here.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Handshaking | Self::Ready)
    }

    /// Whether the connection can never carry traffic again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unopened => write!(f, "unopened"),
            Self::Opening => write!(f, "opening"),
            Self::Handshaking => write!(f, "handshaking"),
            Self::Ready => write!(f, "ready"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
