//! mtls-connect: run one mutually authenticated request/acknowledge exchange
//!
//! Exit codes: 0 when the expected reply arrives verbatim, 1 when the peer
//! answers something else, 2 on any error.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mtls_connector::{
    CipherSuite, Connector, ConnectorConfig, Endpoint, Error, IdentityMaterial, ProtocolVersion,
    Result, SessionPolicy, TrustMaterial,
};

/// Mutually authenticated TLS client.
#[derive(Parser, Debug)]
#[command(name = "mtls-connect")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host name or IP address to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// TCP port.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// PEM file with the CA certificate(s) the server must chain to.
    #[arg(long)]
    ca_cert: PathBuf,

    /// PEM file with the client certificate chain.
    #[arg(long)]
    client_cert: PathBuf,

    /// PEM file with the client private key.
    #[arg(long)]
    client_key: PathBuf,

    /// Name to verify in the server certificate (defaults to --host).
    #[arg(long)]
    server_name: Option<String>,

    /// Skip the server name check; the chain is still verified.
    #[arg(long)]
    no_verify_hostname: bool,

    /// TLS protocol version to pin: 1.2 or 1.3.
    #[arg(long)]
    protocol_version: Option<ProtocolVersion>,

    /// Cipher suite to pin, by IANA or OpenSSL name.
    #[arg(long)]
    cipher_suite: Option<CipherSuite>,

    /// Payload to send; \n, \r, \t and \\ escapes are honoured.
    #[arg(long, default_value = "HELLO FROM PYTHON\\n")]
    payload: String,

    /// Reply expected from the server; escapes as for --payload.
    #[arg(long, default_value = "ACK\\n")]
    expected_reply: String,

    /// Connect, handshake and receive timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_tracing(args.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            return ExitCode::from(2);
        }
    };

    match runtime.block_on(run(args)) {
        Ok(true) => {
            println!("received expected reply");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("unexpected reply");
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("error ({}): {}", e.kind(), e);
            ExitCode::from(2)
        }
    }
}

fn setup_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(args: Args) -> Result<bool> {
    let config = build_config(&args)?;
    let connector = Connector::new(config)?;
    connector.run().await
}

fn build_config(args: &Args) -> Result<ConnectorConfig> {
    let endpoint = Endpoint::new(args.host.as_str(), args.port)?;
    let trust = TrustMaterial::from_pem(read_pem(&args.ca_cert)?)?;
    let identity =
        IdentityMaterial::from_pem(read_pem(&args.client_cert)?, read_pem(&args.client_key)?)?;
    let timeout = Duration::from_secs(args.timeout_secs);

    let mut builder = ConnectorConfig::builder(endpoint, trust, identity)
        .policy(policy_from_args(args.protocol_version, args.cipher_suite)?)
        .verify_hostname(!args.no_verify_hostname)
        .connect_timeout(timeout)
        .receive_timeout(timeout)
        .payload(unescape(&args.payload))
        .expected_reply(unescape(&args.expected_reply));

    if let Some(name) = &args.server_name {
        builder = builder.server_name(name.as_str());
    }

    Ok(builder.build())
}

/// Resolve the pinned version and suite; a lone version picks its first suite.
fn policy_from_args(
    version: Option<ProtocolVersion>,
    suite: Option<CipherSuite>,
) -> Result<SessionPolicy> {
    match (version, suite) {
        (None, None) => Ok(SessionPolicy::default()),
        (Some(version), Some(suite)) => SessionPolicy::new(version, suite),
        (None, Some(suite)) => SessionPolicy::new(suite.protocol_version(), suite),
        (Some(ProtocolVersion::Tls12), None) => Ok(SessionPolicy::default()),
        (Some(ProtocolVersion::Tls13), None) => {
            SessionPolicy::new(ProtocolVersion::Tls13, CipherSuite::Tls13Aes128GcmSha256)
        }
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| Error::Credential(format!("cannot read {}: {}", path.display(), e)))
}

fn unescape(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('r') => out.push(b'\r'),
            Some('t') => out.push(b'\t'),
            Some('\\') => out.push(b'\\'),
            Some(other) => {
                out.push(b'\\');
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => out.push(b'\\'),
        }
    }
    out
}
