//! Error types for mtls-connector

use std::io;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], used by callers to pick a retry policy
/// and by metrics as a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or mismatched certificate/key material
    Credential,
    /// Network failure before the TLS handshake started
    Transport,
    /// TLS negotiation or certificate verification failure
    Handshake,
    /// Read/write failure on an established connection (including timeouts)
    Io,
    /// Invalid endpoint or session policy
    Config,
    /// Operation not valid in the current connection state
    State,
}

impl ErrorKind {
    /// Stable lowercase label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Transport => "transport",
            Self::Handshake => "handshake",
            Self::Io => "io",
            Self::Config => "config",
            Self::State => "state",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Certificate or private key could not be parsed, or key does not match certificate
    #[error("credential error: {0}")]
    Credential(String),

    /// TCP connect failed (refused, unreachable, resolution failure, timed out)
    #[error("transport error connecting to {endpoint}: {source}")]
    Transport {
        /// Endpoint that was being dialed
        endpoint: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// TLS handshake or peer verification failed
    #[error("handshake error: {0}")]
    Handshake(String),

    /// TLS handshake did not complete within the connect timeout
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    /// I/O error on an established connection
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Operation attempted on a closed connection
    #[error("connection closed")]
    ConnectionClosed,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Invalid connection state for the requested operation
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Credential(_) => ErrorKind::Credential,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Handshake(_) | Error::HandshakeTimeout(_) => ErrorKind::Handshake,
            Error::Io(_) | Error::ConnectionClosed => ErrorKind::Io,
            Error::Config(_) => ErrorKind::Config,
            Error::InvalidState { .. } => ErrorKind::State,
        }
    }

    /// Whether a caller could reasonably retry the whole attempt unchanged.
    ///
    /// Credential, handshake and configuration failures need a configuration
    /// change before a retry can succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Io)
    }

    /// Whether this error is a timeout (connect, handshake or receive)
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Transport { source, .. } | Error::Io(source) => {
                source.kind() == io::ErrorKind::TimedOut
            }
            Error::HandshakeTimeout(_) => true,
            _ => false,
        }
    }

    /// Build a transport error for `endpoint`
    pub(crate) fn transport(endpoint: impl std::fmt::Display, source: io::Error) -> Self {
        Error::Transport {
            endpoint: endpoint.to_string(),
            source,
        }
    }
}
