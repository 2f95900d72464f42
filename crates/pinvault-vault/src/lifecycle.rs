//! PIN lifecycle: rotation, interrupted-rotation recovery, reset.
//!
//! ## Pair replacement protocol
//!
//! PIN changes and backup restores both swap the salt and vault as a pair:
//!
//! 1. Write `salt.bin.new`, then `vault.enc.new`, each complete and synced.
//!    An empty `vault.enc.new` means "the new pair has no vault file".
//! 2. Rename `salt.bin.new` over `salt.bin`. This is the commit point.
//! 3. Rename `vault.enc.new` over `vault.enc` (or remove both for an empty
//!    staged vault).
//!
//! A crash before step 2 leaves `salt.bin.new` behind and the old pair
//! valid; a crash between steps 2 and 3 leaves only `vault.enc.new`, which
//! is the matching half of the new pair. [`recover_pending_rotation`] tells
//! the two apart and runs before every salt load.

use std::fs;
use std::path::PathBuf;

use pinvault_crypto_core::SecretString;
use secrecy::ExposeSecret;

use crate::backup;
use crate::codec;
use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::fsio;
use crate::salt::{current_tag, generate_salt, SaltFile};
use crate::store::VaultStore;

/// What [`recover_pending_rotation`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationRecovery {
    /// No staged files.
    Clean,
    /// The rotation had committed; the staged vault was moved into place.
    Completed,
    /// The rotation had not committed; staged files were deleted.
    Discarded,
}

/// Finish or roll back a PIN rotation interrupted by a crash.
///
/// # Errors
///
/// Returns [`VaultError::Io`] if a rename or removal fails.
pub fn recover_pending_rotation(config: &VaultConfig) -> Result<RotationRecovery, VaultError> {
    let staged_salt = config.staged_salt_path();
    let staged_vault = config.staged_vault_path();

    match (staged_salt.exists(), staged_vault.exists()) {
        (false, false) => Ok(RotationRecovery::Clean),
        (false, true) => {
            finish_staged_vault(config)?;
            tracing::warn!("completed interrupted vault replacement");
            Ok(RotationRecovery::Completed)
        }
        (true, _) => {
            discard_staged(config)?;
            tracing::warn!("discarded uncommitted vault replacement");
            Ok(RotationRecovery::Discarded)
        }
    }
}

fn discard_staged(config: &VaultConfig) -> Result<(), VaultError> {
    fsio::remove_if_exists(&config.staged_vault_path())?;
    fsio::remove_if_exists(&config.staged_salt_path())?;
    Ok(())
}

/// Step 3: move the staged vault into place, or drop the vault when the
/// staged file is the empty marker.
fn finish_staged_vault(config: &VaultConfig) -> Result<(), VaultError> {
    let staged = config.staged_vault_path();
    let vault_path = config.vault_path();
    if fs::metadata(&staged)?.len() == 0 {
        fsio::remove_if_exists(&vault_path)?;
        fsio::remove_if_exists(&staged)?;
    } else {
        fs::rename(&staged, &vault_path)?;
    }
    fsio::sync_parent_best_effort(&vault_path);
    Ok(())
}

/// Replace the salt and vault files as one unit.
///
/// `vault` of `None` leaves the new pair without a vault file. Errors before
/// the salt rename leave the old pair in place and remove the staged files.
/// Once the salt rename succeeds the replacement has committed and this
/// returns `Ok`: a failure to move the vault afterwards is logged and
/// finished by [`recover_pending_rotation`] on the next load.
///
/// # Errors
///
/// Returns [`VaultError::Io`] if staging or the salt rename fails.
pub(crate) fn replace_pair(
    config: &VaultConfig,
    salt: &[u8],
    vault: Option<&[u8]>,
) -> Result<(), VaultError> {
    let staged = fsio::write_synced(&config.staged_salt_path(), salt).and_then(|()| {
        fsio::write_synced(&config.staged_vault_path(), vault.unwrap_or_default())
    });
    if let Err(e) = staged {
        let _ = discard_staged(config);
        return Err(e.into());
    }
    commit_staged(config)
}

fn commit_staged(config: &VaultConfig) -> Result<(), VaultError> {
    let salt_path = config.salt_path();
    if let Err(e) = fs::rename(config.staged_salt_path(), &salt_path) {
        let _ = discard_staged(config);
        return Err(e.into());
    }
    fsio::sync_parent_best_effort(&salt_path);

    if let Err(e) = finish_staged_vault(config) {
        tracing::warn!(error = %e, "vault move deferred to next load");
    }
    Ok(())
}

/// Re-key the vault under a new PIN and a fresh salt.
///
/// The old pair is backed up first. The new salt is bound to the current
/// machine, even if the old one was not.
///
/// The swap follows the pair replacement protocol above. Once this returns
/// `Ok` only the new PIN opens the vault, even if the final rename has to be
/// finished by the next load.
///
/// # Errors
///
/// - [`VaultError::NotFound`] if no PIN has been set yet
/// - [`VaultError::WrongPin`] if `old_pin` does not open the vault
/// - [`VaultError::PinMismatch`] if `new_pin` and `confirm_pin` differ
/// - [`VaultError::Backup`] / [`VaultError::Io`] if the backup, staging or
///   the salt rename fails; the old PIN keeps working in that case
pub fn change_pin(
    store: &VaultStore,
    old_pin: SecretString,
    new_pin: SecretString,
    confirm_pin: SecretString,
) -> Result<(), VaultError> {
    if !store.is_initialized() {
        return Err(VaultError::NotFound(
            store.config().salt_path().display().to_string(),
        ));
    }
    let unlocked = store.unlock(old_pin).map_err(|e| match e {
        VaultError::DecryptionFailure => VaultError::WrongPin,
        other => other,
    })?;
    if new_pin.expose_secret() != confirm_pin.expose_secret() {
        return Err(VaultError::PinMismatch);
    }
    drop(confirm_pin);

    let config = store.config();
    backup::create_backup(config)?;

    let tag = current_tag(store.identity())?;
    let salt = generate_salt()?;
    let salt_file = SaltFile::encode(&salt, &tag)?;
    let key = store.derive_key(new_pin, &salt)?;
    let token = codec::encode(key, &unlocked.vault)?;

    replace_pair(config, &salt_file, Some(token.as_bytes()))?;
    tracing::info!(sites = unlocked.vault.len(), "PIN changed");
    Ok(())
}

/// Destroy the salt and vault, optionally backing them up first.
///
/// The old vault can no longer be opened afterwards unless it is restored
/// from the returned backup.
///
/// # Errors
///
/// Returns [`VaultError::Backup`] / [`VaultError::Io`] if the backup or a
/// removal fails. Nothing is removed when the backup fails.
pub fn reset_pin(store: &VaultStore, backup: bool) -> Result<Option<PathBuf>, VaultError> {
    let config = store.config();
    let archive = if backup && config.salt_path().exists() {
        Some(backup::create_backup(config)?)
    } else {
        None
    };

    discard_staged(config)?;
    // Vault before salt: a lone salt is harmless, a lone vault is orphaned.
    fsio::remove_if_exists(&config.vault_path())?;
    store.salt_store().delete()?;

    tracing::warn!(backed_up = archive.is_some(), "vault reset");
    Ok(archive)
}
