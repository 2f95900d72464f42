//! Fuzz target for the salt file parser.
//!
//! Feeds arbitrary bytes to `SaltFile::parse` and must never panic; every
//! accepted file must re-encode to a parseable version 1 file.
//!
//! # Usage
//!
//! ```sh
//! cd crates/pinvault-vault
//! cargo +nightly fuzz run salt_file -- -max_len=256
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use pinvault_crypto_core::FingerprintTag;
use pinvault_vault::salt::SaltFile;

fuzz_target!(|data: &[u8]| {
    if let Ok(file) = SaltFile::parse(data) {
        let tag = file
            .tag
            .unwrap_or_else(|| FingerprintTag::of_machine_id("fuzz"));
        if let Ok(encoded) = SaltFile::encode(&file.salt, &tag) {
            let again = SaltFile::parse(&encoded).expect("re-encoded salt file must parse");
            assert_eq!(again.salt, file.salt);
            assert!(!again.legacy);
        }
    }
});
