//! Endpoint parsing
//!
//! Supports formats:
//! * host:port
//! * 192.0.2.10:port
//! * [2001:db8::1]:port

use crate::{Error, Result};
use std::str::FromStr;

/// A remote TCP endpoint: host name or IP literal plus port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `host` is empty or `port` is 0.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .map(str::to_string)
            .unwrap_or(host);

        if host.is_empty() {
            return Err(Error::Config("endpoint host must not be empty".into()));
        }
        if host
            .chars()
            .any(|c| c.is_whitespace() || c == '[' || c == ']')
        {
            return Err(Error::Config(format!(
                "endpoint host contains invalid characters: '{}'",
                host
            )));
        }
        if port == 0 {
            return Err(Error::Config("endpoint port must be in 1..=65535".into()));
        }

        Ok(Self { host, port })
    }

    /// Host name or IP literal (IPv6 without brackets)
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port
    pub fn port(&self) -> u16 {
        self.port
    }

    fn is_ipv6(&self) -> bool {
        self.host.contains(':')
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or_else(|| {
                Error::Config(format!("unterminated IPv6 literal in endpoint '{}'", s))
            })?;
            let port = after.strip_prefix(':').ok_or_else(|| {
                Error::Config(format!("endpoint '{}' is missing a port", s))
            })?;
            (host, port)
        } else {
            let (host, port) = s
                .rsplit_once(':')
                .ok_or_else(|| Error::Config(format!("endpoint '{}' is missing a port", s)))?;
            if host.contains(':') {
                return Err(Error::Config(format!(
                    "IPv6 endpoint '{}' must be written as [addr]:port",
                    s
                )));
            }
            (host, port)
        };

        let port = port
            .parse::<u16>()
            .map_err(|_| Error::Config(format!("invalid port '{}' in endpoint '{}'", port, s)))?;

        Self::new(host, port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_ipv6() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_port() {
        let endpoint: Endpoint = "127.0.0.1:8000".parse().unwrap();
        assert_eq!(endpoint.host(), "127.0.0.1");
        assert_eq!(endpoint.port(), 8000);
    }

    #[test]
    fn test_parse_hostname() {
        let endpoint: Endpoint = "localhost:443".parse().unwrap();
        assert_eq!(endpoint.host(), "localhost");
        assert_eq!(endpoint.port(), 443);
        assert_eq!(endpoint.to_string(), "localhost:443");
    }

    #[test]
    fn test_parse_ipv6() {
        let endpoint: Endpoint = "[::1]:8000".parse().unwrap();
        assert_eq!(endpoint.host(), "::1");
        assert_eq!(endpoint.port(), 8000);
        assert_eq!(endpoint.to_string(), "[::1]:8000");
    }

    #[test]
    fn test_bare_ipv6_rejected() {
        assert!("::1:8000".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_port_zero_rejected() {
        let err = "127.0.0.1:0".parse::<Endpoint>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(Endpoint::new("127.0.0.1", 0).is_err());
    }

    #[test]
    fn test_port_out_of_range_rejected() {
        assert!("127.0.0.1:65536".parse::<Endpoint>().is_err());
        assert!("127.0.0.1:-1".parse::<Endpoint>().is_err());
        assert!("127.0.0.1:".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_missing_port_rejected() {
        assert!("localhost".parse::<Endpoint>().is_err());
        assert!("[::1]".parse::<Endpoint>().is_err());
        assert!("[::1".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(":8000".parse::<Endpoint>().is_err());
        assert!(Endpoint::new("", 8000).is_err());
        assert!(Endpoint::new("bad host", 8000).is_err());
    }

    #[test]
    fn test_new_strips_brackets() {
        let endpoint = Endpoint::new("[2001:db8::1]", 9000).unwrap();
        assert_eq!(endpoint.host(), "2001:db8::1");
        assert_eq!(endpoint.to_string(), "[2001:db8::1]:9000");
    }

    #[test]
    fn test_roundtrip_through_display() {
        for s in ["127.0.0.1:8000", "example.com:1", "[fe80::1]:65535"] {
            let endpoint: Endpoint = s.parse().unwrap();
            assert_eq!(endpoint.to_string(), s);
        }
    }
}
