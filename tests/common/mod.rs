//! Test PKI and an in-process mTLS peer
//!
//! Certificates are minted per test with rcgen. The peer requires a client
//! certificate chaining to its configured CA, reads one line, and answers
//! according to its [`Behavior`].

#![allow(dead_code)]

use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig, SupportedProtocolVersion};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

/// Protocol versions for a peer that only speaks TLS 1.3
pub static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// A certificate authority that signs leaf certificates for one test
pub struct TestCa {
    cert: rcgen::Certificate,
    key: KeyPair,
}

/// A leaf certificate with its key
pub struct Leaf {
    pub cert_pem: String,
    pub key_pem: String,
    pub der: CertificateDer<'static>,
    key_der: Vec<u8>,
}

impl TestCa {
    pub fn new(common_name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    pub fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    /// Server certificate valid for `names` (DNS names or IP literals)
    pub fn server_leaf(&self, names: &[&str]) -> Leaf {
        self.leaf(names, "TestCerts", ExtendedKeyUsagePurpose::ServerAuth)
    }

    /// Client certificate identified by `common_name`
    pub fn client_leaf(&self, common_name: &str) -> Leaf {
        self.leaf(&[], common_name, ExtendedKeyUsagePurpose::ClientAuth)
    }

    fn leaf(&self, names: &[&str], common_name: &str, usage: ExtendedKeyUsagePurpose) -> Leaf {
        let key = KeyPair::generate().unwrap();
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let mut params = CertificateParams::new(names).unwrap();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.extended_key_usages = vec![usage];
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        Leaf {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
            der: cert.der().clone(),
            key_der: key.serialize_der(),
        }
    }
}

impl Leaf {
    fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }
}

/// What the peer does after reading the client's payload line
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Write these bytes, then close cleanly with close_notify
    Reply(Vec<u8>),
    /// Drop the TCP connection without close_notify
    Drop,
    /// Keep the connection open without replying
    Silent,
}

/// Settings for a [`TestServer`]
pub struct ServerSetup<'a> {
    pub leaf: &'a Leaf,
    pub client_ca: &'a TestCa,
    pub versions: &'static [&'static SupportedProtocolVersion],
    pub behavior: Behavior,
}

impl<'a> ServerSetup<'a> {
    pub fn new(leaf: &'a Leaf, client_ca: &'a TestCa) -> Self {
        Self {
            leaf,
            client_ca,
            versions: rustls::ALL_VERSIONS,
            behavior: Behavior::Reply(b"ACK\n".to_vec()),
        }
    }

    pub fn versions(mut self, versions: &'static [&'static SupportedProtocolVersion]) -> Self {
        self.versions = versions;
        self
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub async fn start(self) -> TestServer {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut roots = RootCertStore::empty();
        roots.add(self.client_ca.der()).unwrap();
        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .unwrap();

        let config = ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(self.versions)
            .unwrap()
            .with_client_cert_verifier(verifier)
            .with_single_cert(vec![self.leaf.der.clone()], self.leaf.private_key())
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, received) = mpsc::unbounded_channel();

        let acceptor = TlsAcceptor::from(Arc::new(config));
        let behavior = self.behavior;
        tokio::spawn(async move {
            loop {
                let Ok((tcp, _)) = listener.accept().await else {
                    return;
                };
                let acceptor = acceptor.clone();
                let behavior = behavior.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Ok(tls) = acceptor.accept(tcp).await {
                        serve(tls, behavior, tx).await;
                    }
                });
            }
        });

        TestServer { addr, received }
    }
}

async fn serve(
    mut tls: tokio_rustls::server::TlsStream<tokio::net::TcpStream>,
    behavior: Behavior,
    tx: mpsc::UnboundedSender<Vec<u8>>,
) {
    let mut line = Vec::new();
    let mut chunk = [0u8; 256];
    while !line.contains(&b'\n') {
        match tls.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => line.extend_from_slice(&chunk[..n]),
        }
    }
    let _ = tx.send(line);

    match behavior {
        Behavior::Reply(reply) => {
            let _ = tls.write_all(&reply).await;
            let _ = tls.shutdown().await;
            // Drain until the client closes so no reset races the reply.
            let mut sink = Vec::new();
            let _ = tokio::time::timeout(Duration::from_secs(5), tls.read_to_end(&mut sink)).await;
        }
        Behavior::Drop => drop(tls),
        Behavior::Silent => tokio::time::sleep(Duration::from_secs(30)).await,
    }
}

/// A running mTLS peer
pub struct TestServer {
    pub addr: SocketAddr,
    received: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl TestServer {
    pub fn endpoint(&self) -> mtls_connector::Endpoint {
        mtls_connector::Endpoint::new("127.0.0.1", self.addr.port()).unwrap()
    }

    /// Next payload line the peer read from a client
    pub async fn received(&mut self) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), self.received.recv())
            .await
            .expect("peer did not report a payload")
            .expect("peer task ended")
    }
}

/// Accept TCP connections and hold them open without ever speaking TLS
pub async fn start_mute_listener() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });
    addr
}

/// CA, server leaf valid for localhost and 127.0.0.1, and a client leaf from the same CA
pub struct Pki {
    pub ca: TestCa,
    pub server: Leaf,
    pub client: Leaf,
}

impl Pki {
    pub fn new() -> Self {
        let ca = TestCa::new("Test CA");
        let server = ca.server_leaf(&["TestCerts", "localhost", "127.0.0.1"]);
        let client = ca.client_leaf("Client0");
        Self { ca, server, client }
    }

    pub fn trust(&self) -> mtls_connector::TrustMaterial {
        mtls_connector::TrustMaterial::from_pem(self.ca.pem()).unwrap()
    }

    pub fn identity(&self) -> mtls_connector::IdentityMaterial {
        mtls_connector::IdentityMaterial::from_pem(&self.client.cert_pem, &self.client.key_pem)
            .unwrap()
    }
}
