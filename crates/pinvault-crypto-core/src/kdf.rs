//! PBKDF2-HMAC-SHA256 key derivation.
//!
//! This module provides:
//! - [`derive`]: turn a PIN + salt into a 256-bit [`DerivedKey`]
//! - [`Pbkdf2Params`]: the tunable iteration count (serializable, lives in config)
//!
//! The PIN is taken by value as a [`SecretString`] and dropped (zeroized)
//! before `derive` returns, so callers cannot hold on to it by accident.

use crate::error::CryptoError;
use crate::memory::SecretBytes;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Output length of the KDF in bytes (256 bits, one AES-256 key).
pub const KEY_LEN: usize = 32;

/// Minimum salt length in bytes.
pub const MIN_SALT_LEN: usize = 16;

/// Lowest iteration count accepted by [`derive`].
pub const MIN_ITERATIONS: u32 = 200_000;

/// Iteration count used for new vaults.
pub const DEFAULT_ITERATIONS: u32 = 1_000_000;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// PBKDF2 parameter set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pbkdf2Params {
    /// HMAC-SHA256 rounds. Never below [`MIN_ITERATIONS`].
    pub iterations: u32,
}

impl Pbkdf2Params {
    /// The production floor. Mostly useful in tests.
    pub const MINIMUM: Self = Self {
        iterations: MIN_ITERATIONS,
    };

    /// Reject parameter sets weaker than the floor.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyDerivation` if `iterations < MIN_ITERATIONS`.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.iterations < MIN_ITERATIONS {
            return Err(CryptoError::KeyDerivation(format!(
                "iteration count too low: {} (minimum {MIN_ITERATIONS})",
                self.iterations
            )));
        }
        Ok(())
    }
}

impl Default for Pbkdf2Params {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// 256-bit vault key. Zeroized on drop; never serializable.
pub struct DerivedKey(SecretBytes<KEY_LEN>);

impl DerivedKey {
    /// Wrap raw key bytes, e.g. in tests or when the key comes from elsewhere.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(SecretBytes::new(bytes))
    }

    /// The key in the form AES-256-GCM consumes it.
    #[must_use]
    pub const fn expose(&self) -> &[u8; KEY_LEN] {
        self.0.expose()
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(***)")
    }
}

// ---------------------------------------------------------------------------
// Core KDF
// ---------------------------------------------------------------------------

/// Derive the vault key from a PIN and salt.
///
/// Identical `(pin, salt, params)` always yields the identical key. The PIN
/// is consumed; its buffer is zeroized when this function returns, on the
/// error paths included.
///
/// PIN strength is not checked here. A four-digit PIN has ten thousand
/// candidates, so against a copied `vault.enc` and `salt.bin` the cost of
/// an offline search is set by the iteration count alone.
/// [`Pbkdf2Params::validate`] refuses anything under [`MIN_ITERATIONS`].
///
/// # Arguments
///
/// - `pin`: the user's PIN, consumed and zeroized
/// - `salt`: at least [`MIN_SALT_LEN`] bytes, exactly as stored on disk
/// - `params`: iteration count, normally from the vault configuration
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the salt is shorter than
/// [`MIN_SALT_LEN`] or `params` is below the iteration floor.
pub fn derive(
    pin: SecretString,
    salt: &[u8],
    params: &Pbkdf2Params,
) -> Result<DerivedKey, CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
            salt.len()
        )));
    }
    params.validate()?;

    let mut output = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(
        pin.expose_secret().as_bytes(),
        salt,
        params.iterations,
        &mut output,
    );
    drop(pin);

    let key = DerivedKey(SecretBytes::new(output));
    output.zeroize();
    Ok(key)
}
