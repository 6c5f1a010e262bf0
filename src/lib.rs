//! mtls-connector: a mutually authenticated TLS client connector
//!
//! Opens one outbound TLS connection, presents a client certificate, verifies
//! the peer against caller-supplied CA certificates, sends one payload, checks
//! the reply against an expected value, and closes.
//!
//! # Design
//!
//! * Credentials are PEM buffers held in memory; nothing touches the filesystem
//! * Exactly one protocol version and one cipher suite per [`SessionPolicy`]
//! * Only the supplied trust anchors are trusted
//! * No session resumption, no retries, no pooling
//! * Every exit path after connect closes the connection
//!
//! # Example
//!
//! ```no_run
//! # async fn example(ca: Vec<u8>, cert: Vec<u8>, key: Vec<u8>) -> mtls_connector::Result<()> {
//! use mtls_connector::{Connector, ConnectorConfig, IdentityMaterial, TrustMaterial};
//!
//! let config = ConnectorConfig::builder(
//!     "127.0.0.1:8000".parse()?,
//!     TrustMaterial::from_pem(ca)?,
//!     IdentityMaterial::from_pem(cert, key)?,
//! )
//! .server_name("TestCerts")
//! .build();
//!
//! let connector = Connector::new(config)?;
//! let acknowledged = connector.exchange(b"HELLO FROM PYTHON\n", b"ACK\n").await?;
//! println!("acknowledged: {}", acknowledged);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod connection;
pub mod error;
pub mod metrics;

pub use client::{connect, Connector, ConnectorConfig, ConnectorConfigBuilder, Endpoint};
pub use connection::{
    CipherSuite, Connection, ConnectionState, IdentityMaterial, ProtocolVersion, SessionPolicy,
    TrustMaterial,
};
pub use error::{Error, ErrorKind, Result};
