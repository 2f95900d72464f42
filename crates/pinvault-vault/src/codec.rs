//! Vault ⇄ token conversion.
//!
//! Both directions take the [`DerivedKey`] by value. It is dropped, and so
//! zeroized, when the call returns on any path. Serialized plaintext only
//! ever lives in zeroizing buffers.

use pinvault_crypto_core::{open, seal, CryptoError, DerivedKey, VaultToken};
use zeroize::Zeroizing;

use crate::entries::Vault;
use crate::error::VaultError;

/// Serialize `vault` canonically and seal it under `key` with a fresh nonce.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if serialization or encryption fails.
pub fn encode(key: DerivedKey, vault: &Vault) -> Result<VaultToken, VaultError> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(vault).map_err(|e| CryptoError::Encryption(e.to_string()))?,
    );
    let token = seal(&key, &plaintext)?;
    drop(key);
    Ok(token)
}

/// Authenticate, decrypt and parse a token.
///
/// # Errors
///
/// Returns [`VaultError::DecryptionFailure`] for every failure: wrong key,
/// tampering, unknown format or version, malformed contents.
pub fn decode(key: DerivedKey, token: &VaultToken) -> Result<Vault, VaultError> {
    let plaintext = open(&key, token).map_err(|_| VaultError::DecryptionFailure)?;
    drop(key);
    serde_json::from_slice(plaintext.expose()).map_err(|_| VaultError::DecryptionFailure)
}
