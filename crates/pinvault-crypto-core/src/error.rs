//! Cryptographic error types for `pinvault-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (PBKDF2 parameter validation, short salt).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Symmetric encryption failure (AES-256-GCM).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Decryption failed. Deliberately carries no detail: wrong key,
    /// tampered bytes and unknown token versions all look the same.
    #[error("decryption failed")]
    Decryption,

    /// Invalid key material (wrong length, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Secure memory allocation failure (CSPRNG, mlock).
    #[error("secure memory error: {0}")]
    SecureMemory(String),

    /// Password generation failure (invalid parameters).
    #[error("password generation error: {0}")]
    PasswordGeneration(String),
}
