//! Metrics instrumentation
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the
//! application installs a recorder.
//!
//! Counters:
//! * `mtls_connect_attempts_total`
//! * `mtls_connect_errors_total{kind}`
//! * `mtls_exchanges_total{outcome}`
//!
//! Histograms:
//! * `mtls_handshake_duration_seconds`

pub mod counters;
pub mod histograms;
pub mod labels;
