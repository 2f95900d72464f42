//! Fuzz target for vault decoding.
//!
//! Feeds arbitrary bytes to `codec::decode` under a fixed key; it must never
//! panic, and must only ever fail with `DecryptionFailure`.
//!
//! # Usage
//!
//! ```sh
//! cd crates/pinvault-vault
//! cargo +nightly fuzz run vault_decode -- -max_len=8192
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use pinvault_crypto_core::{DerivedKey, VaultToken};
use pinvault_vault::codec::decode;
use pinvault_vault::VaultError;

fuzz_target!(|data: &[u8]| {
    let key = DerivedKey::from_bytes([0x5a; 32]);
    match decode(key, &VaultToken::from_bytes(data.to_vec())) {
        Ok(_) | Err(VaultError::DecryptionFailure) => {}
        Err(other) => panic!("unexpected error kind: {other}"),
    }
});
