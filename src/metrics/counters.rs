//! Counter helpers

use super::labels;
use crate::ErrorKind;

/// A connection attempt started
pub fn connect_attempted() {
    metrics::counter!(labels::CONNECT_ATTEMPTS_TOTAL).increment(1);
}

/// A connection attempt failed
pub fn connect_failed(kind: ErrorKind) {
    metrics::counter!(labels::CONNECT_ERRORS_TOTAL, labels::KIND => kind.as_str()).increment(1);
}

/// An exchange finished with `outcome` (one of the `OUTCOME_*` labels)
pub fn exchange_completed(outcome: &'static str) {
    metrics::counter!(labels::EXCHANGES_TOTAL, labels::OUTCOME => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder these are no-ops and must not panic.
    #[test]
    fn test_counters_without_recorder() {
        connect_attempted();
        connect_failed(ErrorKind::Handshake);
        exchange_completed(labels::OUTCOME_MATCH);
    }
}
