//! Remote endpoint address
//!
//! Supports formats:
//! * `host` (default port)
//! * `host:port`
//! * `[v6-address]` and `[v6-address]:port`

use crate::protocol::DEFAULT_PORT;
use crate::{Error, Result};

/// Target address of the job server, immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or IP address, without brackets
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint from host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port`, or a bracketed IPv6 form
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Config("empty endpoint".into()));
        }

        // Bracketed IPv6: [addr] or [addr]:port
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| Error::Config(format!("unclosed bracket in endpoint '{}'", s)))?;
            let port = match tail {
                "" => DEFAULT_PORT,
                _ => parse_port(s, tail.strip_prefix(':').ok_or_else(|| {
                    Error::Config(format!("unexpected trailing data in endpoint '{}'", s))
                })?)?,
            };
            return Self::checked(s, host, port);
        }

        match s.rsplit_once(':') {
            // A second colon means an unbracketed IPv6 address with no port
            Some((head, _)) if head.contains(':') => Self::checked(s, s, DEFAULT_PORT),
            Some((host, port)) => Self::checked(s, host, parse_port(s, port)?),
            None => Self::checked(s, s, DEFAULT_PORT),
        }
    }

    /// Hostnames and addresses never contain brackets; rejecting them
    /// here keeps the display form unambiguous.
    fn checked(endpoint: &str, host: &str, port: u16) -> Result<Self> {
        if host.is_empty() {
            return Err(Error::Config(format!("empty host in endpoint '{}'", endpoint)));
        }
        if host.contains('[') || host.contains(']') {
            return Err(Error::Config(format!("invalid host in endpoint '{}'", endpoint)));
        }
        Ok(Self::new(host, port))
    }
}

fn parse_port(endpoint: &str, port: &str) -> Result<u16> {
    port.parse::<u16>()
        .map_err(|_| Error::Config(format!("invalid port in endpoint '{}'", endpoint)))
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl std::str::FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_and_port() {
        let ep = Endpoint::parse("queue.internal:7000").unwrap();
        assert_eq!(ep.host, "queue.internal");
        assert_eq!(ep.port, 7000);
    }

    #[test]
    fn test_parse_host_only_uses_default_port() {
        let ep = Endpoint::parse("localhost").unwrap();
        assert_eq!(ep.host, "localhost");
        assert_eq!(ep.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_bracketed_ipv6() {
        let ep = Endpoint::parse("[::1]:7420").unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, 7420);

        let ep = Endpoint::parse("[2001:db8::2]").unwrap();
        assert_eq!(ep.host, "2001:db8::2");
        assert_eq!(ep.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_unbracketed_ipv6_gets_default_port() {
        let ep = Endpoint::parse("2001:db8::2").unwrap();
        assert_eq!(ep.host, "2001:db8::2");
        assert_eq!(ep.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Endpoint::parse("").is_err());
        assert!(Endpoint::parse(":7419").is_err());
        assert!(Endpoint::parse("host:notaport").is_err());
        assert!(Endpoint::parse("host:99999").is_err());
        assert!(Endpoint::parse("[::1").is_err());
        assert!(Endpoint::parse("a]b:7419").is_err());
        assert!(Endpoint::parse("a:b]:c").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["queue.internal:7419", "[::1]:7000"] {
            let ep: Endpoint = s.parse().unwrap();
            assert_eq!(ep.to_string(), s);
        }
    }
}
