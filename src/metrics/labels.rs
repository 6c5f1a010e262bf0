//! Metric names and label values

/// Connection attempts, successful or not
pub const CONNECT_ATTEMPTS_TOTAL: &str = "mtls_connect_attempts_total";

/// Failed connection attempts, labelled by error kind
pub const CONNECT_ERRORS_TOTAL: &str = "mtls_connect_errors_total";

/// Finished exchanges, labelled by outcome
pub const EXCHANGES_TOTAL: &str = "mtls_exchanges_total";

/// Time from TCP connected to handshake complete
pub const HANDSHAKE_DURATION_SECONDS: &str = "mtls_handshake_duration_seconds";

/// Label key for error kinds
pub const KIND: &str = "kind";
/// Label key for exchange outcomes
pub const OUTCOME: &str = "outcome";

/// Peer sent exactly the expected reply
pub const OUTCOME_MATCH: &str = "match";
/// Peer sent something else or closed early
pub const OUTCOME_MISMATCH: &str = "mismatch";
/// The exchange failed with an error
pub const OUTCOME_ERROR: &str = "error";
