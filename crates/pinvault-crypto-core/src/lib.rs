//! `pinvault-crypto-core`: Pure cryptographic primitives for PinVault.
//!
//! No filesystem, no network, no logging: everything here is a function of
//! its inputs plus the OS CSPRNG.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod fingerprint;
pub mod kdf;
pub mod symmetric;
pub mod token;

pub mod password;

pub use error::CryptoError;
pub use fingerprint::FingerprintTag;
pub use kdf::{derive, DerivedKey, Pbkdf2Params, DEFAULT_ITERATIONS, MIN_ITERATIONS};
pub use memory::{disable_core_dumps, SecretBuffer, SecretBytes};
pub use password::{generate_password, DEFAULT_PASSWORD_LENGTH};
pub use secrecy::SecretString;
pub use symmetric::{decrypt, encrypt, SealedData};
pub use token::{open, seal, VaultToken, TOKEN_VERSION};
