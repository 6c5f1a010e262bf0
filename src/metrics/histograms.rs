//! Histogram helpers

use super::labels;
use std::time::Duration;

/// Record how long a TLS handshake took
pub fn handshake_duration(elapsed: Duration) {
    metrics::histogram!(labels::HANDSHAKE_DURATION_SECONDS).record(elapsed.as_secs_f64());
}
