//! Vault error types for `pinvault-vault`.

use pinvault_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Cryptographic operation failed (delegated from crypto-core). Key
    /// derivation failures land here and indicate a configuration defect.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The vault could not be opened. Wrong PIN, flipped bits, unknown
    /// version and malformed contents are indistinguishable on purpose.
    #[error("wrong PIN or corrupted vault")]
    DecryptionFailure,

    /// The salt file exists but matches no known layout. It is never
    /// regenerated automatically: doing so would orphan the vault.
    #[error("salt file missing or corrupt: {0}")]
    SaltMissingOrCorrupt(String),

    /// No stable machine identifier could be obtained.
    #[error("machine identity unavailable: {0}")]
    UnavailableIdentity(String),

    /// The PIN given to a save or a PIN change does not open the vault.
    #[error("wrong PIN")]
    WrongPin,

    /// New PIN and its confirmation differ.
    #[error("new PIN and confirmation do not match")]
    PinMismatch,

    /// A file the operation needs is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backup archive creation, listing or restore failed.
    #[error("backup error: {0}")]
    Backup(String),

    /// Configuration file unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error from the filesystem. In-memory vault data is unaffected;
    /// the save can be retried.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
