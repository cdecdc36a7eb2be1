//! Stock identification handshake
//!
//! Answers the server banner with a `HELLO {json}` payload naming this
//! client, proves the password when the greeting demands one, and waits
//! for the server's verdict. This is the handshake most pools inject;
//! anything fancier implements [`Handshake`] directly.

use super::{verbs, Greeting, Reply, PROTOCOL_VERSION};
use crate::connection::TcpConnection;
use crate::factory::Handshake;
use crate::{Error, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Identification handshake speaking the HELLO exchange.
///
/// Built fluently; every field is optional. A worker handshake carries a
/// worker id the server uses to track job reservations, a plain consumer
/// identifies by hostname alone.
#[derive(Debug, Clone)]
pub struct HelloHandshake {
    hostname: Option<String>,
    wid: Option<String>,
    labels: Vec<String>,
    password: Option<String>,
}

impl HelloHandshake {
    /// Handshake for a plain consumer, identified by hostname only
    pub fn new() -> Self {
        Self {
            hostname: None,
            wid: None,
            labels: Vec::new(),
            password: None,
        }
    }

    /// Handshake for a job-processing worker, with a generated worker id
    pub fn worker() -> Self {
        Self {
            wid: Some(random_wid()),
            ..Self::new()
        }
    }

    /// Set the password proved when the greeting carries a salt
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Override the generated worker id
    pub fn worker_id(mut self, wid: impl Into<String>) -> Self {
        self.wid = Some(wid.into());
        self
    }

    /// Override the hostname reported to the server (default: the
    /// machine's hostname)
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Add a label the server shows next to this client
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }
}

impl Default for HelloHandshake {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handshake<TcpConnection> for HelloHandshake {
    async fn handshake(&self, conn: &mut TcpConnection, greeting: &Greeting) -> Result<String> {
        let hostname = match &self.hostname {
            Some(hostname) => hostname.clone(),
            None => whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string()),
        };

        // Password proof is demanded by the greeting, not by our config
        let pwdhash = match greeting.salt.as_deref() {
            Some(salt) => {
                let password = self.password.as_deref().ok_or_else(|| {
                    Error::Handshake("server requires a password and none is configured".into())
                })?;
                Some(password_digest(
                    password,
                    salt,
                    greeting.iterations.unwrap_or(1),
                ))
            }
            None => None,
        };

        let payload = HelloPayload {
            hostname: &hostname,
            wid: self.wid.as_deref(),
            pid: std::process::id(),
            labels: &self.labels,
            version: PROTOCOL_VERSION,
            pwdhash,
        };
        let json = serde_json::to_string(&payload)
            .map_err(|e| Error::Protocol(format!("HELLO payload serialization: {}", e)))?;

        conn.send_line(&format!("{} {}", verbs::HELLO, json)).await?;

        let reply = conn.read_line().await?;
        match Reply::parse(&reply)? {
            Reply::Ok("OK") => {}
            Reply::Ok(other) => {
                return Err(Error::Protocol(format!(
                    "unexpected reply to {}: {:?}",
                    verbs::HELLO,
                    other
                )));
            }
            Reply::Error(msg) => return Err(Error::Handshake(msg.to_string())),
        }
        conn.finish_handshake()?;

        Ok(self.wid.clone().unwrap_or(hostname))
    }
}

#[derive(Serialize)]
struct HelloPayload<'a> {
    hostname: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    wid: Option<&'a str>,
    pid: u32,
    labels: &'a [String],
    #[serde(rename = "v")]
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pwdhash: Option<String>,
}

/// Hex SHA-256 of password and salt, re-hashed `iterations` times total.
///
/// An iteration count below one is treated as one: the concatenation is
/// always hashed at least once.
fn password_digest(password: &str, salt: &str, iterations: u32) -> String {
    let mut hash = Sha256::digest(format!("{}{}", password, salt));
    for _ in 1..iterations {
        hash = Sha256::digest(hash);
    }
    hex::encode(hash)
}

fn random_wid() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}
