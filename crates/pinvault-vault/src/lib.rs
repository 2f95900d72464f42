//! `pinvault-vault`: Vault storage and business logic for PinVault.
//!
//! Turns a PIN into a vault key via the machine-bound salt file, keeps the
//! encrypted vault file in sync with an in-memory [`Vault`], and manages
//! the PIN lifecycle (rotation, reset, backups).

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod config;
pub mod error;
mod fsio;
pub mod identity;

pub mod codec;
pub mod salt;
pub mod store;

pub mod entries;

pub mod backup;
pub mod lifecycle;

pub use backup::{create_backup, list_backups, restore_backup, BackupInfo, MAX_BACKUPS};
pub use config::VaultConfig;
pub use entries::{
    add_entry, add_entry_with_url, delete_entry, edit_entry, generate_password, search_entries,
    CredentialEntry, EntryUpdate, Vault, DEFAULT_PASSWORD_LENGTH,
};
pub use error::VaultError;
pub use identity::{FixedIdentity, MachineIdentity, PlatformIdentity};
pub use lifecycle::{change_pin, recover_pending_rotation, reset_pin, RotationRecovery};
pub use pinvault_crypto_core::SecretString;
pub use salt::{generate_salt, Binding, SaltLoad, SaltStore};
pub use store::{Unlocked, VaultStore};
