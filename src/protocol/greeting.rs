//! Server banner parsing

use super::{verbs, Reply};
use crate::{Error, Result};
use serde::Deserialize;

/// Parsed `+HI {json}` banner, the first line the server sends.
///
/// Carries the protocol version and, when the server wants password proof
/// in the HELLO payload, the salt and digest iteration count. The factory
/// passes the greeting to the handshake without inspecting it.
#[derive(Debug, Clone, Deserialize)]
pub struct Greeting {
    /// Protocol version the server speaks
    #[serde(rename = "v")]
    pub version: u32,

    /// Password salt, present only when the server requires a password
    #[serde(rename = "s", default)]
    pub salt: Option<String>,

    /// Digest iteration count accompanying the salt
    #[serde(rename = "i", default)]
    pub iterations: Option<u32>,
}

impl Greeting {
    /// Parse the banner line (without its CRLF terminator).
    ///
    /// Accepts only a well-formed `+HI {json}` line. A `-` reply in the
    /// banner position means the server refused the connection outright.
    pub fn parse(line: &str) -> Result<Self> {
        let payload = match Reply::parse(line)? {
            Reply::Ok(payload) => payload,
            Reply::Error(msg) => {
                return Err(Error::Protocol(format!(
                    "server refused connection: {}",
                    msg
                )));
            }
        };

        let (verb, json) = match payload.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim_start()),
            None => (payload, ""),
        };
        if verb != verbs::HI {
            return Err(Error::Protocol(format!(
                "expected {} banner, got: {:?}",
                verbs::HI,
                line
            )));
        }
        if json.is_empty() {
            return Err(Error::Protocol("banner missing payload".into()));
        }

        serde_json::from_str(json)
            .map_err(|e| Error::Protocol(format!("malformed banner payload: {}", e)))
    }
}
