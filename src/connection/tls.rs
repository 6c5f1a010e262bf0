//! TLS client configuration for mutually authenticated connections.
//!
//! Assembles a rustls `ClientConfig` from in-memory trust and identity material
//! and a [`SessionPolicy`]. The resulting configuration trusts only the supplied
//! CA certificates, always presents the client identity, negotiates exactly one
//! protocol version and cipher suite, and never offers session resumption.

use super::credentials::{IdentityMaterial, TrustMaterial};
use super::policy::SessionPolicy;
use crate::{Error, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{Resumption, WebPkiServerVerifier};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::sync::Arc;

/// TLS configuration for one connector.
///
/// # Examples
///
/// ```ignore
/// use mtls_connector::connection::{IdentityMaterial, TlsConfig, TrustMaterial};
///
/// let trust = TrustMaterial::from_pem(ca_pem)?;
/// let identity = IdentityMaterial::from_pem(client_cert_pem, client_key_pem)?;
///
/// let tls = TlsConfig::builder(trust, identity)
///     .verify_hostname(true)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Pinned protocol and cipher
    policy: SessionPolicy,
    /// Whether the peer certificate must name the server
    verify_hostname: bool,
    /// Number of trust anchors in the root store
    trust_anchors: usize,
    /// Compiled rustls ClientConfig
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder.
    pub fn builder(trust: TrustMaterial, identity: IdentityMaterial) -> TlsConfigBuilder {
        TlsConfigBuilder {
            trust,
            identity,
            policy: SessionPolicy::default(),
            verify_hostname: true,
        }
    }

    /// Get the rustls ClientConfig for this TLS configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// The session policy this configuration enforces
    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Check if hostname verification is enabled.
    pub fn verify_hostname(&self) -> bool {
        self.verify_hostname
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("policy", &self.policy)
            .field("verify_hostname", &self.verify_hostname)
            .field("trust_anchors", &self.trust_anchors)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration.
pub struct TlsConfigBuilder {
    trust: TrustMaterial,
    identity: IdentityMaterial,
    policy: SessionPolicy,
    verify_hostname: bool,
}

impl TlsConfigBuilder {
    /// Set the session policy (default: TLS 1.2, ECDHE-ECDSA-AES128-GCM-SHA256).
    pub fn policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable hostname verification (default: enabled).
    ///
    /// When disabled the peer chain must still verify against the trust
    /// material; only the check that the leaf certificate names the server is
    /// skipped. Useful for peers whose certificates carry the service name in
    /// the subject CN only.
    pub fn verify_hostname(mut self, verify: bool) -> Self {
        self.verify_hostname = verify;
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Credential`] if the trust material has no usable anchor, or
    ///   the client key is unsupported or does not match the certificate
    /// - [`Error::Config`] if the TLS stack rejects the session policy
    pub fn build(self) -> Result<TlsConfig> {
        let root_store = Arc::new(self.trust.root_store()?);
        let trust_anchors = root_store.len();

        let provider = Arc::new(self.policy.crypto_provider()?);

        // Fails early on a key that does not belong to the certificate
        self.identity.certified_key(&provider)?;

        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(&[self.policy.protocol_version().rustls_version()])
            .map_err(|e| Error::Config(format!("session policy rejected: {}", e)))?;

        let builder = if self.verify_hostname {
            builder.with_root_certificates(root_store)
        } else {
            let inner = WebPkiServerVerifier::builder_with_provider(root_store, provider)
                .build()
                .map_err(|e| Error::Credential(format!("failed to build peer verifier: {}", e)))?;
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(ChainOnlyVerifier { inner }))
        };

        let mut client_config = builder
            .with_client_auth_cert(
                self.identity.certificate_chain().to_vec(),
                self.identity.private_key(),
            )
            .map_err(|e| Error::Credential(format!("failed to configure client auth: {}", e)))?;

        client_config.resumption = Resumption::disabled();

        tracing::debug!(
            protocol = %self.policy.protocol_version(),
            cipher = %self.policy.cipher_suite(),
            trust_anchors,
            verify_hostname = self.verify_hostname,
            "built TLS client config"
        );

        Ok(TlsConfig {
            policy: self.policy,
            verify_hostname: self.verify_hostname,
            trust_anchors,
            client_config: Arc::new(client_config),
        })
    }
}

/// Verifies the peer chain against the trust anchors but accepts any name.
#[derive(Debug)]
struct ChainOnlyVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for ChainOnlyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Err(rustls::Error::InvalidCertificate(CertificateError::NotValidForName))
            | Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Parse server name for TLS SNI and certificate name checks.
///
/// Accepts DNS names (a trailing dot is stripped) and IPv4/IPv6 literals,
/// with or without brackets.
///
/// # Errors
///
/// Returns [`Error::Config`] if the name is empty, too long, or not a valid
/// DNS name or IP address.
pub fn parse_server_name(hostname: &str) -> Result<ServerName<'static>> {
    let hostname = hostname
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(hostname);
    let hostname = hostname.strip_suffix('.').unwrap_or(hostname);

    if hostname.is_empty() || hostname.len() > 253 {
        return Err(Error::Config(format!(
            "invalid server name for TLS: '{}'",
            hostname
        )));
    }

    ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Config(format!("invalid server name for TLS: '{}'", hostname)))
}
