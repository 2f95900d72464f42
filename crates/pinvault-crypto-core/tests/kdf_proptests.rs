#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for PBKDF2 key derivation.

use pinvault_crypto_core::kdf::{derive, Pbkdf2Params, KEY_LEN};
use pinvault_crypto_core::SecretString;
use proptest::prelude::*;

fn pin(s: &str) -> SecretString {
    SecretString::from(s.to_owned())
}

proptest! {
    // Each case runs 2 × 200k PBKDF2 rounds; keep the case count small.
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Same PIN and salt always give the same key.
    #[test]
    fn derive_is_deterministic(
        pin_text in "[0-9]{4,8}",
        salt in proptest::collection::vec(any::<u8>(), 16..80),
    ) {
        let a = derive(pin(&pin_text), &salt, &Pbkdf2Params::MINIMUM).unwrap();
        let b = derive(pin(&pin_text), &salt, &Pbkdf2Params::MINIMUM).unwrap();
        prop_assert_eq!(a.expose(), b.expose());
        prop_assert_eq!(a.expose().len(), KEY_LEN);
    }

    /// Appending a digit to the PIN changes the key.
    #[test]
    fn pin_change_changes_key(pin_text in "[0-9]{4,8}") {
        let salt = b"proptest_salt_16b";
        let a = derive(pin(&pin_text), salt, &Pbkdf2Params::MINIMUM).unwrap();
        let b = derive(pin(&format!("{pin_text}0")), salt, &Pbkdf2Params::MINIMUM).unwrap();
        prop_assert_ne!(a.expose(), b.expose());
    }
}

#[test]
fn iteration_count_is_part_of_the_key() {
    let salt = b"0123456789abcdef";
    let a = derive(pin("1234"), salt, &Pbkdf2Params::MINIMUM).unwrap();
    let b = derive(
        pin("1234"),
        salt,
        &Pbkdf2Params {
            iterations: Pbkdf2Params::MINIMUM.iterations + 1,
        },
    )
    .unwrap();
    assert_ne!(a.expose(), b.expose());
}
