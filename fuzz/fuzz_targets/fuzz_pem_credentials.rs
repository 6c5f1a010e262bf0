#![no_main]

use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use mtls_connector::{IdentityMaterial, TrustMaterial};

#[derive(Debug)]
struct PemInput {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
}

impl<'a> Arbitrary<'a> for PemInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        Ok(Self {
            cert_pem: u.arbitrary()?,
            key_pem: u.arbitrary()?,
        })
    }
}

fuzz_target!(|input: PemInput| {
    // Arbitrary bytes must yield a Credential error, never a panic.
    if let Ok(trust) = TrustMaterial::from_pem(&input.cert_pem) {
        assert!(!trust.certificates().is_empty());
    }

    if let Ok(identity) = IdentityMaterial::from_pem(&input.cert_pem, &input.key_pem) {
        assert!(!identity.certificate_chain().is_empty());
        assert!(!format!("{:?}", identity).contains("PRIVATE KEY"));
    }
});
