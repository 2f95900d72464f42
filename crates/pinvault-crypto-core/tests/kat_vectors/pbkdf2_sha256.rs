//! PBKDF2-HMAC-SHA256 known answers (the SHA-256 counterparts of the
//! RFC 6070 inputs).
//!
//! The published vectors use iteration counts far below the derivation
//! floor, so they run against the raw `pbkdf2` primitive; `derive` is then
//! checked to be exactly that primitive at its own parameters.

use pinvault_crypto_core::kdf::{derive, Pbkdf2Params, KEY_LEN, MIN_ITERATIONS};
use pinvault_crypto_core::SecretString;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn raw(password: &[u8], salt: &[u8], rounds: u32) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, rounds, &mut out);
    out
}

#[test]
fn password_salt_1_iteration() {
    assert_eq!(
        hex(&raw(b"password", b"salt", 1)),
        "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
    );
}

#[test]
fn password_salt_2_iterations() {
    assert_eq!(
        hex(&raw(b"password", b"salt", 2)),
        "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
    );
}

#[test]
fn password_salt_4096_iterations() {
    assert_eq!(
        hex(&raw(b"password", b"salt", 4096)),
        "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
    );
}

#[test]
fn derive_is_raw_pbkdf2_at_floor() {
    let salt = b"pinvault-kat-salt";
    let key = derive(
        SecretString::from("123456".to_owned()),
        salt,
        &Pbkdf2Params::MINIMUM,
    )
    .unwrap();
    assert_eq!(key.expose(), &raw(b"123456", salt, MIN_ITERATIONS));
}
