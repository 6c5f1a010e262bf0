//! Transport: TCP connect followed by the mutual TLS handshake

use super::policy::{CipherSuite, ProtocolVersion};
use super::tls::TlsConfig;
use crate::client::Endpoint;
use crate::{Error, Result};
use bytes::BytesMut;
use rustls_pki_types::ServerName;
use sha2::Digest;
use std::io;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// An established TLS-over-TCP stream whose handshake, including verification
/// of both certificate chains, has completed.
pub struct Transport {
    stream: TlsStream<TcpStream>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Transport(TlsStream)")
    }
}

impl Transport {
    /// Connect via TCP and perform the TLS handshake.
    ///
    /// `timeout` bounds the TCP connect and the handshake separately.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if the TCP connect fails or times out
    /// - [`Error::Handshake`] if negotiation or certificate verification fails,
    ///   the peer aborts the handshake, or it times out
    pub async fn connect(
        endpoint: &Endpoint,
        server_name: ServerName<'static>,
        tls_config: &TlsConfig,
        timeout: Duration,
    ) -> Result<Self> {
        let tcp_stream =
            match tokio::time::timeout(timeout, TcpStream::connect((endpoint.host(), endpoint.port())))
                .await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return Err(Error::transport(endpoint, e)),
                Err(_) => {
                    return Err(Error::transport(
                        endpoint,
                        io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("connect timed out after {:?}", timeout),
                        ),
                    ))
                }
            };

        tcp_stream
            .set_nodelay(true)
            .map_err(|e| Error::transport(endpoint, e))?;
        tracing::debug!(peer = ?tcp_stream.peer_addr().ok(), "tcp connected");

        let handshake_start = Instant::now();
        let tls_connector = TlsConnector::from(tls_config.client_config());
        let stream =
            match tokio::time::timeout(timeout, tls_connector.connect(server_name, tcp_stream)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return Err(classify_handshake_error(e)),
                Err(_) => return Err(Error::HandshakeTimeout(timeout)),
            };
        crate::metrics::histograms::handshake_duration(handshake_start.elapsed());

        Ok(Transport { stream })
    }

    /// Wait up to `window` for the peer's verdict on our certificate.
    ///
    /// Under TLS 1.3 the client completes the handshake before the server has
    /// checked the client certificate; a rejection arrives as an alert later.
    ///
    /// Reads at most one byte of application data into `buf`. A window that
    /// elapses without an alert counts as acceptance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if the peer rejects the session, closes it,
    /// or fails the connection within `window`.
    pub async fn await_peer_verdict(&mut self, buf: &mut BytesMut, window: Duration) -> Result<()> {
        match tokio::time::timeout(window, self.read_buf_limited(buf, 1)).await {
            Err(_) => Ok(()),
            Ok(Ok(0)) => Err(Error::Handshake(
                "peer closed the session right after the handshake".into(),
            )),
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e @ Error::Handshake(_))) => Err(e),
            Ok(Err(e)) => Err(Error::Handshake(format!(
                "peer aborted the session after the handshake: {}",
                e
            ))),
        }
    }

    /// Write all bytes to the stream
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.stream
            .write_all(buf)
            .await
            .map_err(classify_session_error)
    }

    /// Flush the stream
    pub async fn flush(&mut self) -> Result<()> {
        self.stream.flush().await.map_err(classify_session_error)
    }

    /// Read at most `limit` bytes into `buf`.
    ///
    /// Returns 0 once the peer has closed the session cleanly. A peer that drops
    /// the TCP connection without a TLS close_notify yields an
    /// `UnexpectedEof` I/O error instead.
    pub async fn read_buf_limited(&mut self, buf: &mut BytesMut, limit: usize) -> Result<usize> {
        (&mut self.stream)
            .take(limit as u64)
            .read_buf(buf)
            .await
            .map_err(classify_session_error)
    }

    /// Send close_notify and shut down the write half
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// SHA-256 of the peer's DER-encoded leaf certificate.
    pub fn peer_certificate_fingerprint(&self) -> Option<Vec<u8>> {
        let (_tcp, conn) = self.stream.get_ref();
        let certs = conn.peer_certificates()?;
        let leaf = certs.first()?;
        Some(sha2::Sha256::digest(leaf.as_ref()).to_vec())
    }

    /// Cipher suite agreed during the handshake
    pub fn negotiated_cipher_suite(&self) -> Option<CipherSuite> {
        let (_tcp, conn) = self.stream.get_ref();
        conn.negotiated_cipher_suite()
            .and_then(|suite| CipherSuite::from_rustls(suite.suite()))
    }

    /// Protocol version agreed during the handshake
    pub fn negotiated_protocol_version(&self) -> Option<ProtocolVersion> {
        let (_tcp, conn) = self.stream.get_ref();
        conn.protocol_version().and_then(ProtocolVersion::from_rustls)
    }
}

/// Map a failed handshake to [`Error::Handshake`], keeping the rustls reason
/// when there is one.
fn classify_handshake_error(e: io::Error) -> Error {
    if let Some(tls_error) = e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        return Error::Handshake(tls_error.to_string());
    }
    Error::Handshake(format!("peer aborted handshake: {}", e))
}

/// Map an I/O failure on an established session.
///
/// An alert by which the peer refuses our certificate or the session is a
/// late handshake failure; everything else stays [`Error::Io`].
fn classify_session_error(e: io::Error) -> Error {
    use rustls::AlertDescription as Alert;

    if let Some(rustls::Error::AlertReceived(alert)) = e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        if matches!(
            alert,
            Alert::BadCertificate
                | Alert::UnsupportedCertificate
                | Alert::CertificateRevoked
                | Alert::CertificateExpired
                | Alert::CertificateUnknown
                | Alert::CertificateRequired
                | Alert::UnknownCA
                | Alert::AccessDenied
                | Alert::DecryptError
                | Alert::HandshakeFailure
        ) {
            return Error::Handshake(format!("peer rejected the session: {:?}", alert));
        }
    }
    Error::Io(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rustls_error() {
        let inner = rustls::Error::InvalidCertificate(rustls::CertificateError::UnknownIssuer);
        let err = classify_handshake_error(io::Error::new(io::ErrorKind::InvalidData, inner));
        match err {
            Error::Handshake(msg) => assert!(msg.to_lowercase().contains("issuer"), "{}", msg),
            other => panic!("expected handshake error, got {:?}", other),
        }
    }

    #[test]
    fn test_session_rejection_alert_is_handshake() {
        let inner = rustls::Error::AlertReceived(rustls::AlertDescription::UnknownCA);
        let err = classify_session_error(io::Error::new(io::ErrorKind::InvalidData, inner));
        assert!(matches!(err, Error::Handshake(_)), "{:?}", err);
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_session_close_alert_stays_io() {
        let inner = rustls::Error::AlertReceived(rustls::AlertDescription::InternalError);
        let err = classify_session_error(io::Error::new(io::ErrorKind::InvalidData, inner));
        assert!(matches!(err, Error::Io(_)), "{:?}", err);

        let err = classify_session_error(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_classify_plain_io_error() {
        let err = classify_handshake_error(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(matches!(err, Error::Handshake(_)));
    }
}
