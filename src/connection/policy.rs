//! Session policy: the single protocol version and cipher suite a connection may negotiate.

use crate::{Error, Result};
use rustls::crypto::CryptoProvider;
use rustls::SupportedProtocolVersion;

/// TLS protocol version pinned for a session.
///
/// The minimum and maximum negotiated version are both this value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// TLS 1.2
    #[default]
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl ProtocolVersion {
    pub(crate) fn rustls_version(&self) -> &'static SupportedProtocolVersion {
        match self {
            Self::Tls12 => &rustls::version::TLS12,
            Self::Tls13 => &rustls::version::TLS13,
        }
    }

    pub(crate) fn from_rustls(version: rustls::ProtocolVersion) -> Option<Self> {
        match version {
            rustls::ProtocolVersion::TLSv1_2 => Some(Self::Tls12),
            rustls::ProtocolVersion::TLSv1_3 => Some(Self::Tls13),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tls12 => write!(f, "TLSv1.2"),
            Self::Tls13 => write!(f, "TLSv1.3"),
        }
    }
}

impl std::str::FromStr for ProtocolVersion {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1.2" | "tls1.2" | "tlsv1.2" | "tlsv1_2" => Ok(Self::Tls12),
            "1.3" | "tls1.3" | "tlsv1.3" | "tlsv1_3" => Ok(Self::Tls13),
            _ => Err(Error::Config(format!(
                "invalid protocol version '{}': expected 1.2 or 1.3",
                s
            ))),
        }
    }
}

/// Cipher suites the connector can pin.
///
/// Accepted by IANA name (`TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256`) or
/// OpenSSL name (`ECDHE-ECDSA-AES128-GCM-SHA256`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    /// TLS 1.3 AES-128-GCM with SHA-256
    Tls13Aes128GcmSha256,
    /// TLS 1.3 AES-256-GCM with SHA-384
    Tls13Aes256GcmSha384,
    /// TLS 1.3 ChaCha20-Poly1305 with SHA-256
    Tls13Chacha20Poly1305Sha256,
    /// ECDHE key exchange, ECDSA certificates, AES-128-GCM
    #[default]
    EcdheEcdsaAes128GcmSha256,
    /// ECDHE key exchange, ECDSA certificates, AES-256-GCM
    EcdheEcdsaAes256GcmSha384,
    /// ECDHE key exchange, ECDSA certificates, ChaCha20-Poly1305
    EcdheEcdsaChacha20Poly1305Sha256,
    /// ECDHE key exchange, RSA certificates, AES-128-GCM
    EcdheRsaAes128GcmSha256,
    /// ECDHE key exchange, RSA certificates, AES-256-GCM
    EcdheRsaAes256GcmSha384,
    /// ECDHE key exchange, RSA certificates, ChaCha20-Poly1305
    EcdheRsaChacha20Poly1305Sha256,
}

/// (suite, IANA name, OpenSSL name, rustls id, protocol version)
type SuiteEntry = (
    CipherSuite,
    &'static str,
    &'static str,
    rustls::CipherSuite,
    ProtocolVersion,
);

// Indexed by `CipherSuite` discriminant
const SUITES: &[SuiteEntry] = &[
    (
        CipherSuite::Tls13Aes128GcmSha256,
        "TLS_AES_128_GCM_SHA256",
        "TLS_AES_128_GCM_SHA256",
        rustls::CipherSuite::TLS13_AES_128_GCM_SHA256,
        ProtocolVersion::Tls13,
    ),
    (
        CipherSuite::Tls13Aes256GcmSha384,
        "TLS_AES_256_GCM_SHA384",
        "TLS_AES_256_GCM_SHA384",
        rustls::CipherSuite::TLS13_AES_256_GCM_SHA384,
        ProtocolVersion::Tls13,
    ),
    (
        CipherSuite::Tls13Chacha20Poly1305Sha256,
        "TLS_CHACHA20_POLY1305_SHA256",
        "TLS_CHACHA20_POLY1305_SHA256",
        rustls::CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
        ProtocolVersion::Tls13,
    ),
    (
        CipherSuite::EcdheEcdsaAes128GcmSha256,
        "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        "ECDHE-ECDSA-AES128-GCM-SHA256",
        rustls::CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        ProtocolVersion::Tls12,
    ),
    (
        CipherSuite::EcdheEcdsaAes256GcmSha384,
        "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        "ECDHE-ECDSA-AES256-GCM-SHA384",
        rustls::CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        ProtocolVersion::Tls12,
    ),
    (
        CipherSuite::EcdheEcdsaChacha20Poly1305Sha256,
        "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
        "ECDHE-ECDSA-CHACHA20-POLY1305",
        rustls::CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
        ProtocolVersion::Tls12,
    ),
    (
        CipherSuite::EcdheRsaAes128GcmSha256,
        "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        "ECDHE-RSA-AES128-GCM-SHA256",
        rustls::CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        ProtocolVersion::Tls12,
    ),
    (
        CipherSuite::EcdheRsaAes256GcmSha384,
        "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        "ECDHE-RSA-AES256-GCM-SHA384",
        rustls::CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
        ProtocolVersion::Tls12,
    ),
    (
        CipherSuite::EcdheRsaChacha20Poly1305Sha256,
        "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
        "ECDHE-RSA-CHACHA20-POLY1305",
        rustls::CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
        ProtocolVersion::Tls12,
    ),
];

impl CipherSuite {
    fn entry(&self) -> &'static SuiteEntry {
        &SUITES[*self as usize]
    }

    /// IANA registry name
    pub fn iana_name(&self) -> &'static str {
        self.entry().1
    }

    /// OpenSSL cipher string name
    pub fn openssl_name(&self) -> &'static str {
        self.entry().2
    }

    /// The only protocol version this suite can be negotiated under
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.entry().4
    }

    pub(crate) fn rustls_suite(&self) -> rustls::CipherSuite {
        self.entry().3
    }

    pub(crate) fn from_rustls(suite: rustls::CipherSuite) -> Option<Self> {
        SUITES
            .iter()
            .find(|entry| entry.3 == suite)
            .map(|entry| entry.0)
    }
}

impl std::fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.iana_name())
    }
}

impl std::str::FromStr for CipherSuite {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        SUITES
            .iter()
            .find(|entry| {
                entry.1.eq_ignore_ascii_case(wanted) || entry.2.eq_ignore_ascii_case(wanted)
            })
            .map(|entry| entry.0)
            .ok_or_else(|| Error::Config(format!("unsupported cipher suite '{}'", s)))
    }
}

/// Protocol and cipher pinning for one connection attempt.
///
/// The default policy is TLS 1.2 with `ECDHE-ECDSA-AES128-GCM-SHA256` and no
/// compression. Session resumption is never offered, whatever the policy.
///
/// # Examples
///
/// ```ignore
/// let policy = SessionPolicy::builder()
///     .protocol_version(ProtocolVersion::Tls13)
///     .cipher_suite(CipherSuite::Tls13Aes128GcmSha256)
///     .build()?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    protocol_version: ProtocolVersion,
    cipher_suite: CipherSuite,
    disable_compression: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion::Tls12,
            cipher_suite: CipherSuite::EcdheEcdsaAes128GcmSha256,
            disable_compression: true,
        }
    }
}

impl SessionPolicy {
    /// Create a policy for `version` and `suite`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the suite cannot be negotiated under `version`.
    pub fn new(version: ProtocolVersion, suite: CipherSuite) -> Result<Self> {
        Self::builder()
            .protocol_version(version)
            .cipher_suite(suite)
            .build()
    }

    /// Create a builder starting from the default policy
    pub fn builder() -> SessionPolicyBuilder {
        SessionPolicyBuilder::default()
    }

    /// Pinned protocol version
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    /// Pinned cipher suite
    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    /// Whether TLS-level compression is disabled (always true for a built policy)
    pub fn disable_compression(&self) -> bool {
        self.disable_compression
    }

    /// A crypto provider restricted to the pinned cipher suite.
    pub(crate) fn crypto_provider(&self) -> Result<CryptoProvider> {
        let mut provider = rustls::crypto::ring::default_provider();
        let wanted = self.cipher_suite.rustls_suite();
        provider.cipher_suites.retain(|suite| suite.suite() == wanted);

        if provider.cipher_suites.is_empty() {
            return Err(Error::Config(format!(
                "cipher suite {} is not available in the TLS provider",
                self.cipher_suite
            )));
        }
        Ok(provider)
    }
}

/// Builder for [`SessionPolicy`].
#[derive(Debug, Clone)]
pub struct SessionPolicyBuilder {
    protocol_version: ProtocolVersion,
    cipher_suite: CipherSuite,
    disable_compression: bool,
}

impl Default for SessionPolicyBuilder {
    fn default() -> Self {
        let policy = SessionPolicy::default();
        Self {
            protocol_version: policy.protocol_version,
            cipher_suite: policy.cipher_suite,
            disable_compression: policy.disable_compression,
        }
    }
}

impl SessionPolicyBuilder {
    /// Set the protocol version
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Set the cipher suite
    pub fn cipher_suite(mut self, suite: CipherSuite) -> Self {
        self.cipher_suite = suite;
        self
    }

    /// Disable TLS compression (default: true).
    ///
    /// rustls never compresses records, so `false` is rejected at build time.
    pub fn disable_compression(mut self, disable: bool) -> Self {
        self.disable_compression = disable;
        self
    }

    /// Validate and build the policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the cipher suite belongs to a different
    /// protocol version, or if compression was requested.
    pub fn build(self) -> Result<SessionPolicy> {
        if self.cipher_suite.protocol_version() != self.protocol_version {
            return Err(Error::Config(format!(
                "cipher suite {} requires {}, but policy pins {}",
                self.cipher_suite,
                self.cipher_suite.protocol_version(),
                self.protocol_version
            )));
        }

        if !self.disable_compression {
            return Err(Error::Config(
                "TLS compression is not supported".into(),
            ));
        }

        Ok(SessionPolicy {
            protocol_version: self.protocol_version,
            cipher_suite: self.cipher_suite,
            disable_compression: self.disable_compression,
        })
    }
}
