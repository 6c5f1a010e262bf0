//! Connection management
//!
//! This module handles:
//! * Credential loading (CA trust anchors, client identity)
//! * Session policy (pinned protocol version and cipher suite)
//! * rustls client configuration
//! * TCP connect and mutual TLS handshake
//! * Connection lifecycle and state machine enforcement

mod conn;
mod credentials;
mod policy;
mod state;
mod tls;
mod transport;

pub use conn::Connection;
pub use credentials::{IdentityMaterial, TrustMaterial};
pub use policy::{CipherSuite, ProtocolVersion, SessionPolicy, SessionPolicyBuilder};
pub use state::ConnectionState;
pub use tls::{parse_server_name, TlsConfig, TlsConfigBuilder};
pub use transport::Transport;
