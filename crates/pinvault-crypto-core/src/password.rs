//! Random password generation.
//!
//! Characters are drawn uniformly and independently from the 94 printable
//! ASCII symbols (letters, digits, punctuation) using `OsRng`.

use rand::rngs::OsRng;
use rand::Rng;

use crate::error::CryptoError;

/// Smallest accepted length.
pub const MIN_PASSWORD_LENGTH: usize = 1;

/// Largest accepted length.
pub const MAX_PASSWORD_LENGTH: usize = 1024;

/// Length used when the caller has no preference.
pub const DEFAULT_PASSWORD_LENGTH: usize = 16;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const PUNCTUATION: &[u8] = b"!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Generate a password of exactly `length` characters.
///
/// No character class is forced in; every position is an independent
/// uniform draw over the full alphabet.
///
/// # Errors
///
/// Returns [`CryptoError::PasswordGeneration`] if `length` is outside
/// [`MIN_PASSWORD_LENGTH`]..=[`MAX_PASSWORD_LENGTH`].
pub fn generate_password(length: usize) -> Result<String, CryptoError> {
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return Err(CryptoError::PasswordGeneration(format!(
            "length must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH}, got {length}"
        )));
    }

    let alphabet = alphabet();
    let mut rng = OsRng;
    let password = (0..length)
        .map(|_| char::from(alphabet[rng.gen_range(0..alphabet.len())]))
        .collect();
    Ok(password)
}

fn alphabet() -> Vec<u8> {
    [LETTERS, DIGITS, PUNCTUATION].concat()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn alphabet_is_printable_ascii_without_space() {
        let alphabet = alphabet();
        assert_eq!(alphabet.len(), 94);
        let unique: HashSet<u8> = alphabet.iter().copied().collect();
        assert_eq!(unique.len(), 94);
        assert!(alphabet.iter().all(|b| b.is_ascii_graphic()));
    }

    #[test]
    fn exact_length() {
        for len in [1, DEFAULT_PASSWORD_LENGTH, 64, MAX_PASSWORD_LENGTH] {
            assert_eq!(generate_password(len).unwrap().len(), len);
        }
    }

    #[test]
    fn zero_and_oversized_lengths_rejected() {
        let err = generate_password(0).unwrap_err();
        assert!(err.to_string().contains("length must be between"));
        assert!(generate_password(MAX_PASSWORD_LENGTH + 1).is_err());
    }

    #[test]
    fn only_alphabet_characters() {
        let pw = generate_password(512).unwrap();
        assert!(pw.bytes().all(|b| b.is_ascii_graphic()), "unexpected char in {pw}");
    }

    #[test]
    fn long_output_covers_every_class() {
        // 1024 uniform draws miss a whole class with negligible probability.
        let pw = generate_password(MAX_PASSWORD_LENGTH).unwrap();
        assert!(pw.chars().any(|c| c.is_ascii_lowercase()));
        assert!(pw.chars().any(|c| c.is_ascii_uppercase()));
        assert!(pw.chars().any(|c| c.is_ascii_digit()));
        assert!(pw.chars().any(|c| c.is_ascii_punctuation()));
    }

    #[test]
    fn outputs_are_unique() {
        let passwords: HashSet<String> = (0..100).map(|_| generate_password(20).unwrap()).collect();
        assert_eq!(passwords.len(), 100);
    }
}
