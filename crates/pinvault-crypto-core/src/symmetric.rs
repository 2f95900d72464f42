//! AES-256-GCM authenticated encryption.
//!
//! - [`encrypt`]: seal plaintext under a fresh random nonce
//! - [`decrypt`]: authenticate and open a [`SealedData`]
//!
//! Nonces come from `OsRng` on every call; two seals under one key never
//! share a nonce except by 96-bit collision.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use zeroize::Zeroize;

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// AES-256-GCM key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Nonce + ciphertext + tag.
#[must_use = "encrypted data must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedData {
    pub nonce: [u8; NONCE_LEN],
    /// Same length as the plaintext.
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

fn sealing_key(key: &[u8]) -> Result<aead::LessSafeKey, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "invalid key length: {} bytes (expected {KEY_LEN})",
            key.len()
        )));
    }
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under `key`, authenticating `aad` alongside it.
///
/// A 96-bit nonce is drawn from `OsRng` for every call and returned in the
/// [`SealedData`]. Callers never supply nonces: the vault key is reused for
/// every save under the same PIN, and a repeated nonce under AES-GCM leaks
/// the XOR of two plaintexts and the authentication subkey.
///
/// # Arguments
///
/// - `plaintext`: data to encrypt (may be empty)
/// - `key`: exactly 32 bytes
/// - `aad`: bytes authenticated but not encrypted, e.g. a file header
///   (may be empty)
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` if the key is not 32 bytes and
/// `CryptoError::Encryption` if the CSPRNG or the cipher fails.
pub fn encrypt(plaintext: &[u8], key: &[u8], aad: &[u8]) -> Result<SealedData, CryptoError> {
    let sealing = sealing_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|e| CryptoError::Encryption(format!("nonce generation failed: {e}")))?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    let Ok(tag) = sealing.seal_in_place_separate_tag(nonce, aead::Aad::from(aad), &mut in_out)
    else {
        in_out.zeroize();
        return Err(CryptoError::Encryption(
            "AES-256-GCM encryption failed".into(),
        ));
    };

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());

    Ok(SealedData {
        nonce: nonce_bytes,
        ciphertext: in_out,
        tag: tag_bytes,
    })
}

/// Open a [`SealedData`]. The plaintext comes back in a [`SecretBuffer`].
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` for a key of the wrong length
/// and `CryptoError::Decryption` for any authentication failure (wrong key,
/// tampered nonce/ciphertext/tag, wrong AAD).
pub fn decrypt(sealed: &SealedData, key: &[u8], aad: &[u8]) -> Result<SecretBuffer, CryptoError> {
    let opening = sealing_key(key)?;
    let nonce = aead::Nonce::assume_unique_for_key(sealed.nonce);

    let mut ct_tag = Vec::with_capacity(sealed.ciphertext.len().saturating_add(TAG_LEN));
    ct_tag.extend_from_slice(&sealed.ciphertext);
    ct_tag.extend_from_slice(&sealed.tag);

    let opened = opening.open_in_place(nonce, aead::Aad::from(aad), &mut ct_tag);
    let result = match opened {
        Ok(plaintext) => SecretBuffer::new(plaintext),
        Err(_) => Err(CryptoError::Decryption),
    };
    ct_tag.zeroize();
    result
}
