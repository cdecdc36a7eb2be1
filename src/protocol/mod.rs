//! Job-server line protocol
//!
//! Covers the slice of the protocol the connection lifecycle needs:
//! * the `+HI {json}` banner the server sends on connect
//! * the `HELLO {json}` identification payload
//! * the single-line `+OK` / `-ERR` reply format
//!
//! Lines are UTF-8 terminated by CRLF. General message framing past the
//! handshake is carried by higher layers, not here.

mod greeting;
mod hello;

pub use greeting::Greeting;
pub use hello::HelloHandshake;

use crate::{Error, Result};

/// Port the job server listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 7419;

/// Highest protocol version this client speaks
pub const PROTOCOL_VERSION: u32 = 2;

/// Upper bound on a single protocol line.
///
/// Banner and reply lines are small. A buffer that grows past this without
/// a terminator means a framing bug or a hostile peer, and the reader bails
/// instead of buffering forever.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Verbs used by the lifecycle exchange
pub mod verbs {
    /// Server banner verb
    pub const HI: &str = "HI";

    /// Client identification verb
    pub const HELLO: &str = "HELLO";

    /// Goodbye sent before closing the transport
    pub const END: &str = "END";
}

/// A reply line split into marker and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
    /// `+payload` success line
    Ok(&'a str),
    /// `-message` error line
    Error(&'a str),
}

impl<'a> Reply<'a> {
    /// Parse a reply line (without its CRLF terminator)
    pub fn parse(line: &'a str) -> Result<Self> {
        match line.as_bytes().first() {
            Some(b'+') => Ok(Reply::Ok(&line[1..])),
            Some(b'-') => Ok(Reply::Error(&line[1..])),
            _ => Err(Error::Protocol(format!("malformed reply line: {:?}", line))),
        }
    }
}
