//! FIPS 180-2 SHA-256 vectors through the fingerprint tag.

use pinvault_crypto_core::FingerprintTag;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[test]
fn empty_identifier() {
    assert_eq!(
        hex(FingerprintTag::of_machine_id("").as_bytes()),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn abc_identifier() {
    assert_eq!(
        hex(FingerprintTag::of_machine_id("abc").as_bytes()),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
