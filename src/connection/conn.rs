//! Core connection type

use super::policy::{CipherSuite, ProtocolVersion};
use super::state::ConnectionState;
use super::tls::TlsConfig;
use super::transport::Transport;
use crate::client::Endpoint;
use crate::{Error, Result};
use bytes::BytesMut;
use rustls_pki_types::ServerName;
use std::io;
use std::time::Duration;
use tracing::Instrument;

/// Upper bound on sending close_notify during [`Connection::close`]
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// A live, mutually authenticated TLS connection.
///
/// Exists only after TCP connect and a fully verified handshake. Exclusively
/// owned: every operation takes `&mut self`. After [`close`](Self::close),
/// reads and writes fail with an I/O-class error.
pub struct Connection {
    transport: Option<Transport>,
    state: ConnectionState,
    read_buf: BytesMut,
    endpoint: Endpoint,
}

impl Connection {
    /// Dial `endpoint` and complete the mutual TLS handshake.
    ///
    /// `connect_timeout` bounds the TCP connect and the handshake. Under TLS 1.3
    /// the connection is reported only after the peer had `verdict_window`
    /// (capped at `connect_timeout`) to reject our certificate.
    pub async fn establish(
        endpoint: &Endpoint,
        server_name: ServerName<'static>,
        tls_config: &TlsConfig,
        connect_timeout: Duration,
        verdict_window: Duration,
    ) -> Result<Self> {
        let mut state = ConnectionState::Unconnected;
        let mut read_buf = BytesMut::with_capacity(64);

        let mut transport = Transport::connect(endpoint, server_name, tls_config, connect_timeout)
            .instrument(tracing::debug_span!("handshake"))
            .await?;

        if transport.negotiated_protocol_version() == Some(ProtocolVersion::Tls13) {
            transport
                .await_peer_verdict(&mut read_buf, verdict_window.min(connect_timeout))
                .await?;
        }

        state.transition(ConnectionState::Connected)?;

        let conn = Self {
            transport: Some(transport),
            state,
            read_buf,
            endpoint: endpoint.clone(),
        };

        tracing::info!(
            endpoint = %conn.endpoint,
            protocol = ?conn.negotiated_protocol_version(),
            cipher = ?conn.negotiated_cipher_suite(),
            "TLS connection established"
        );
        Ok(conn)
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Endpoint this connection was dialed to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send the full payload and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] after [`close`](Self::close),
    /// [`Error::Handshake`] if the peer has rejected our certificate, or
    /// [`Error::Io`] if the write fails.
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        let transport = self.live_transport()?;
        transport.write_all(payload).await?;
        transport.flush().await?;
        tracing::debug!(bytes = payload.len(), "payload sent");
        Ok(())
    }

    /// Read until `expected.len()` bytes arrived, the peer closed the session,
    /// or `timeout` elapsed, then compare with `expected`.
    ///
    /// Never reads past `expected.len()` bytes. A clean close before the full
    /// reply arrived yields `Ok(false)`, as does any byte mismatch.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] with kind `TimedOut` if `timeout` elapses
    /// - [`Error::Io`] if the read fails, including a peer dropping TCP without
    ///   a TLS close_notify
    /// - [`Error::Handshake`] if the peer rejects our certificate late
    /// - [`Error::ConnectionClosed`] after [`close`](Self::close)
    pub async fn receive_expected(&mut self, expected: &[u8], timeout: Duration) -> Result<bool> {
        if self.state != ConnectionState::Connected {
            return Err(Error::ConnectionClosed);
        }

        let Self {
            transport,
            read_buf,
            ..
        } = self;
        let transport = transport.as_mut().ok_or(Error::ConnectionClosed)?;

        let read = async {
            while read_buf.len() < expected.len() {
                let remaining = expected.len() - read_buf.len();
                let n = transport.read_buf_limited(read_buf, remaining).await?;
                if n == 0 {
                    tracing::debug!(received = read_buf.len(), "peer closed before full reply");
                    break;
                }
            }
            Ok::<_, Error>(())
        };

        match tokio::time::timeout(timeout, read).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!(
                        "no complete reply within {:?} ({} of {} bytes)",
                        timeout,
                        read_buf.len(),
                        expected.len()
                    ),
                )))
            }
        }

        let reply = read_buf.split_to(read_buf.len().min(expected.len()));
        let matched = reply[..] == *expected;
        if !matched {
            tracing::debug!(
                received = ?String::from_utf8_lossy(&reply),
                expected = ?String::from_utf8_lossy(expected),
                "unexpected reply"
            );
        }
        Ok(matched)
    }

    /// Close the connection.
    ///
    /// Sends close_notify (best effort, bounded) and releases the socket.
    /// Idempotent: later calls do nothing.
    pub async fn close(&mut self) {
        let _ = self.state.transition(ConnectionState::Closed);

        if let Some(mut transport) = self.transport.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, transport.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "error during TLS shutdown"),
                Err(_) => tracing::debug!("TLS shutdown timed out"),
            }
            tracing::info!(endpoint = %self.endpoint, "connection closed");
        }
    }

    /// SHA-256 fingerprint of the peer's leaf certificate
    pub fn peer_certificate_fingerprint(&self) -> Option<Vec<u8>> {
        self.transport
            .as_ref()
            .and_then(Transport::peer_certificate_fingerprint)
    }

    /// Cipher suite negotiated in the handshake
    pub fn negotiated_cipher_suite(&self) -> Option<CipherSuite> {
        self.transport
            .as_ref()
            .and_then(Transport::negotiated_cipher_suite)
    }

    /// Protocol version negotiated in the handshake
    pub fn negotiated_protocol_version(&self) -> Option<ProtocolVersion> {
        self.transport
            .as_ref()
            .and_then(Transport::negotiated_protocol_version)
    }

    fn live_transport(&mut self) -> Result<&mut Transport> {
        if self.state != ConnectionState::Connected {
            return Err(Error::ConnectionClosed);
        }
        self.transport.as_mut().ok_or(Error::ConnectionClosed)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .finish()
    }
}
