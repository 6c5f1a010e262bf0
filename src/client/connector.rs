//! Connector implementation

use super::endpoint::Endpoint;
use crate::connection::{
    parse_server_name, Connection, IdentityMaterial, SessionPolicy, TlsConfig, TrustMaterial,
};
use crate::metrics::labels;
use crate::Result;
use rustls_pki_types::ServerName;
use std::time::Duration;
use tracing::Instrument;

/// Default bound on connect, handshake and receive
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time a TLS 1.3 peer gets to reject our certificate after the handshake
pub const DEFAULT_VERDICT_WINDOW: Duration = Duration::from_millis(200);

/// Payload of the reference exchange
pub const DEFAULT_PAYLOAD: &[u8] = b"HELLO FROM PYTHON\n";

/// Reply expected by the reference exchange
pub const DEFAULT_EXPECTED_REPLY: &[u8] = b"ACK\n";

/// Everything a [`Connector`] needs to dial, authenticate and exchange.
///
/// Use `ConnectorConfig::builder()` for anything beyond the defaults.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Remote endpoint
    pub endpoint: Endpoint,
    /// CA certificates the peer chain must verify against
    pub trust: TrustMaterial,
    /// Client certificate and key presented to the peer
    pub identity: IdentityMaterial,
    /// Pinned protocol version and cipher suite
    pub policy: SessionPolicy,
    /// Name checked against the peer certificate and sent as SNI (default: endpoint host)
    pub server_name: Option<String>,
    /// Whether the peer certificate must carry the server name (default: true)
    pub verify_hostname: bool,
    /// Bound on TCP connect and on the TLS handshake (default: 10 seconds)
    pub connect_timeout: Duration,
    /// Bound on waiting for the expected reply (default: 10 seconds)
    pub receive_timeout: Duration,
    /// Time a TLS 1.3 peer gets to reject our certificate before the
    /// connection counts as established (default: 200 milliseconds)
    pub verdict_window: Duration,
    /// Bytes written by [`Connector::run`]
    pub payload: Vec<u8>,
    /// Reply awaited by [`Connector::run`]
    pub expected_reply: Vec<u8>,
}

impl ConnectorConfig {
    /// Create new configuration with defaults
    ///
    /// # Defaults
    ///
    /// - `policy`: TLS 1.2, ECDHE-ECDSA-AES128-GCM-SHA256, no compression
    /// - `server_name`: None (use the endpoint host)
    /// - `verify_hostname`: true
    /// - `connect_timeout`, `receive_timeout`: 10 seconds
    /// - `verdict_window`: 200 milliseconds (TLS 1.3 only)
    /// - `payload`: `HELLO FROM PYTHON\n`, `expected_reply`: `ACK\n`
    pub fn new(endpoint: Endpoint, trust: TrustMaterial, identity: IdentityMaterial) -> Self {
        Self::builder(endpoint, trust, identity).build()
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnectorConfig::builder(endpoint, trust, identity)
    ///     .server_name("TestCerts")
    ///     .connect_timeout(Duration::from_secs(5))
    ///     .receive_timeout(Duration::from_secs(2))
    ///     .build();
    /// ```
    pub fn builder(
        endpoint: Endpoint,
        trust: TrustMaterial,
        identity: IdentityMaterial,
    ) -> ConnectorConfigBuilder {
        ConnectorConfigBuilder {
            config: ConnectorConfig {
                endpoint,
                trust,
                identity,
                policy: SessionPolicy::default(),
                server_name: None,
                verify_hostname: true,
                connect_timeout: DEFAULT_TIMEOUT,
                receive_timeout: DEFAULT_TIMEOUT,
                verdict_window: DEFAULT_VERDICT_WINDOW,
                payload: DEFAULT_PAYLOAD.to_vec(),
                expected_reply: DEFAULT_EXPECTED_REPLY.to_vec(),
            },
        }
    }

    /// Name used for SNI and certificate verification
    pub fn effective_server_name(&self) -> &str {
        self.server_name
            .as_deref()
            .unwrap_or_else(|| self.endpoint.host())
    }
}

/// Builder for creating `ConnectorConfig`
#[derive(Debug, Clone)]
pub struct ConnectorConfigBuilder {
    config: ConnectorConfig,
}

impl ConnectorConfigBuilder {
    /// Set the session policy
    pub fn policy(mut self, policy: SessionPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Set the name verified against the peer certificate
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = Some(name.into());
        self
    }

    /// Enable or disable hostname verification
    ///
    /// With verification off the peer chain must still verify against the
    /// trust anchors; only the name check is skipped.
    pub fn verify_hostname(mut self, verify: bool) -> Self {
        self.config.verify_hostname = verify;
        self
    }

    /// Set TCP connect and handshake timeout
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config.connect_timeout = duration;
        self
    }

    /// Set the timeout for receiving the expected reply
    pub fn receive_timeout(mut self, duration: Duration) -> Self {
        self.config.receive_timeout = duration;
        self
    }

    /// Set how long a TLS 1.3 peer may take to reject our certificate
    ///
    /// TLS 1.3 lets the client finish the handshake before the server has
    /// verified the client certificate. No payload is sent until this window
    /// passed without a rejection.
    pub fn verdict_window(mut self, window: Duration) -> Self {
        self.config.verdict_window = window;
        self
    }

    /// Set the payload sent by [`Connector::run`]
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.config.payload = payload.into();
        self
    }

    /// Set the reply expected by [`Connector::run`]
    pub fn expected_reply(mut self, reply: impl Into<Vec<u8>>) -> Self {
        self.config.expected_reply = reply.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectorConfig {
        self.config
    }
}

/// Mutual TLS client for one endpoint.
///
/// Holds a compiled rustls configuration; every [`connect`](Self::connect)
/// opens a fresh connection with its own full handshake.
#[derive(Debug, Clone)]
pub struct Connector {
    config: ConnectorConfig,
    tls: TlsConfig,
    server_name: ServerName<'static>,
}

impl Connector {
    /// Validate the configuration and compile the TLS client settings.
    ///
    /// # Errors
    ///
    /// - [`Error::Credential`](crate::Error::Credential) if the identity key
    ///   does not match its certificate or the trust material is unusable
    /// - [`Error::Config`](crate::Error::Config) if the server name is invalid
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        let server_name = parse_server_name(config.effective_server_name())?;
        let tls = TlsConfig::builder(config.trust.clone(), config.identity.clone())
            .policy(config.policy)
            .verify_hostname(config.verify_hostname)
            .build()?;

        Ok(Self {
            config,
            tls,
            server_name,
        })
    }

    /// Configuration this connector was built from
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Open a connection: TCP connect plus verified mutual handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`](crate::Error::Transport) if the endpoint is unreachable
    /// - [`Error::Handshake`](crate::Error::Handshake) if negotiation or
    ///   verification fails on either side
    pub async fn connect(&self) -> Result<Connection> {
        let span = tracing::info_span!(
            "connect",
            endpoint = %self.config.endpoint,
            server_name = %self.config.effective_server_name(),
        );

        crate::metrics::counters::connect_attempted();
        let result = Connection::establish(
            &self.config.endpoint,
            self.server_name.clone(),
            &self.tls,
            self.config.connect_timeout,
            self.config.verdict_window,
        )
        .instrument(span)
        .await;

        if let Err(ref e) = result {
            tracing::warn!(endpoint = %self.config.endpoint, kind = %e.kind(), error = %e, "connect failed");
            crate::metrics::counters::connect_failed(e.kind());
        }
        result
    }

    /// Connect, send `payload`, await `expected`, and close.
    ///
    /// Returns whether the peer answered with exactly `expected`. The
    /// connection is closed on every path once it has been opened.
    pub async fn exchange(&self, payload: &[u8], expected: &[u8]) -> Result<bool> {
        let mut conn = match self.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                crate::metrics::counters::exchange_completed(labels::OUTCOME_ERROR);
                return Err(e);
            }
        };

        let result = Self::send_and_receive(&mut conn, payload, expected, self.config.receive_timeout).await;
        conn.close().await;

        let outcome = match result {
            Ok(true) => labels::OUTCOME_MATCH,
            Ok(false) => labels::OUTCOME_MISMATCH,
            Err(_) => labels::OUTCOME_ERROR,
        };
        crate::metrics::counters::exchange_completed(outcome);
        tracing::debug!(outcome, "exchange finished");

        result
    }

    /// Run the configured exchange
    pub async fn run(&self) -> Result<bool> {
        self.exchange(&self.config.payload, &self.config.expected_reply)
            .await
    }

    async fn send_and_receive(
        conn: &mut Connection,
        payload: &[u8],
        expected: &[u8],
        timeout: Duration,
    ) -> Result<bool> {
        conn.send(payload).await?;
        conn.receive_expected(expected, timeout).await
    }
}

/// Open a connection to `endpoint` with default timeouts, verifying the peer
/// against `trust` and presenting `identity`.
///
/// Shorthand for building a [`Connector`] and calling
/// [`Connector::connect`].
///
/// # Examples
///
/// ```no_run
/// # async fn example(ca: &[u8], cert: &[u8], key: &[u8]) -> mtls_connector::Result<()> {
/// use mtls_connector::{connect, IdentityMaterial, SessionPolicy, TrustMaterial};
/// use std::time::Duration;
///
/// let trust = TrustMaterial::from_pem(ca)?;
/// let identity = IdentityMaterial::from_pem(cert, key)?;
///
/// let mut conn = connect("127.0.0.1:8000".parse()?, trust, identity, SessionPolicy::default()).await?;
/// conn.send(b"HELLO FROM PYTHON\n").await?;
/// let acknowledged = conn.receive_expected(b"ACK\n", Duration::from_secs(10)).await?;
/// conn.close().await;
/// # Ok(())
/// # }
/// ```
pub async fn connect(
    endpoint: Endpoint,
    trust: TrustMaterial,
    identity: IdentityMaterial,
    policy: SessionPolicy,
) -> Result<Connection> {
    let config = ConnectorConfig::builder(endpoint, trust, identity)
        .policy(policy)
        .build();
    Connector::new(config)?.connect().await
}
