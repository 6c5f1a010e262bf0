#![no_main]

use libfuzzer_sys::fuzz_target;
use mtls_connector::Endpoint;

fuzz_target!(|data: &str| {
    if let Ok(endpoint) = data.parse::<Endpoint>() {
        assert_ne!(endpoint.port(), 0);
        assert!(!endpoint.host().is_empty());

        // Display output parses back to the same endpoint.
        let reparsed: Endpoint = endpoint.to_string().parse().unwrap();
        assert_eq!(reparsed, endpoint);
    }
});
