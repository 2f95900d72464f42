//! File-backed vault: salt, key derivation and the encrypted vault file.
//!
//! ```text
//! unlock:  salt.bin ──► derive(pin) ──► open(vault.enc) ──► Vault
//! persist: Vault ──► seal ──► vault.enc (atomic)
//! ```
//!
//! The derived key exists only inside a single [`VaultStore::unlock`] or
//! [`VaultStore::persist`] call.

use std::fs;

use pinvault_crypto_core::{derive, open, DerivedKey, SecretString, VaultToken};

use crate::codec;
use crate::config::VaultConfig;
use crate::entries::Vault;
use crate::error::VaultError;
use crate::fsio;
use crate::identity::{MachineIdentity, PlatformIdentity};
use crate::lifecycle;
use crate::salt::{Binding, SaltLoad, SaltStore};

/// A decrypted vault plus the machine-binding signal from its salt.
#[derive(Debug)]
pub struct Unlocked {
    pub vault: Vault,
    pub binding: Binding,
    /// The salt file was created by this unlock (first run).
    pub created: bool,
}

impl Unlocked {
    /// See [`SaltLoad::authorized`].
    #[must_use]
    pub const fn authorized(&self) -> bool {
        matches!(self.binding, Binding::Bound | Binding::Unbound)
    }
}

/// Vault files described by a [`VaultConfig`], checked against one machine
/// identity.
pub struct VaultStore {
    config: VaultConfig,
    identity: Box<dyn MachineIdentity>,
}

impl std::fmt::Debug for VaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VaultStore {
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if `config` fails validation.
    pub fn new(
        config: VaultConfig,
        identity: impl MachineIdentity + 'static,
    ) -> Result<Self, VaultError> {
        config.validate()?;
        Ok(Self {
            config,
            identity: Box::new(identity),
        })
    }

    /// Store bound to the operating system's machine identifier.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if `config` fails validation.
    pub fn with_platform_identity(config: VaultConfig) -> Result<Self, VaultError> {
        Self::new(config, PlatformIdentity)
    }

    #[must_use]
    pub const fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub(crate) fn identity(&self) -> &dyn MachineIdentity {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn salt_store(&self) -> SaltStore<'_> {
        SaltStore::new(self.config.salt_path(), self.identity())
    }

    /// Whether a salt file exists, i.e. a PIN has been set.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.config.salt_path().exists()
    }

    #[must_use]
    pub fn vault_exists(&self) -> bool {
        self.config.vault_path().exists()
    }

    /// Finish or discard an interrupted PIN rotation, then load (or create)
    /// the salt.
    ///
    /// # Errors
    ///
    /// As for [`lifecycle::recover_pending_rotation`] and
    /// [`SaltStore::get_or_create`].
    pub fn load_salt(&self) -> Result<SaltLoad, VaultError> {
        lifecycle::recover_pending_rotation(&self.config)?;
        self.salt_store().get_or_create()
    }

    /// Rewrite a legacy salt file in the current layout; see
    /// [`SaltStore::migrate_legacy`].
    ///
    /// # Errors
    ///
    /// As for [`SaltStore::migrate_legacy`].
    pub fn migrate_legacy_salt(&self) -> Result<bool, VaultError> {
        lifecycle::recover_pending_rotation(&self.config)?;
        self.salt_store().migrate_legacy()
    }

    /// Derive the vault key with the configured parameters.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] on a KDF failure, which points at a
    /// configuration defect rather than a wrong PIN.
    pub fn derive_key(&self, pin: SecretString, salt: &[u8]) -> Result<DerivedKey, VaultError> {
        Ok(derive(pin, salt, &self.config.kdf)?)
    }

    /// Read and decrypt the vault file. A missing file is an empty vault.
    ///
    /// # Errors
    ///
    /// - [`VaultError::DecryptionFailure`] for a wrong key or damaged file
    /// - [`VaultError::Io`] if the file exists but cannot be read
    pub fn open_vault(&self, key: DerivedKey) -> Result<Vault, VaultError> {
        let path = self.config.vault_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no vault file, starting empty");
                return Ok(Vault::new());
            }
            Err(e) => return Err(e.into()),
        };
        codec::decode(key, &VaultToken::from_bytes(bytes))
    }

    /// Encrypt `vault` and replace the vault file atomically.
    ///
    /// On error the previous file is intact and `vault` is untouched, so the
    /// save can be retried.
    ///
    /// # Errors
    ///
    /// [`VaultError::Crypto`] if encryption fails, [`VaultError::Io`] if the
    /// write fails.
    pub fn save_vault(&self, key: DerivedKey, vault: &Vault) -> Result<(), VaultError> {
        let token = codec::encode(key, vault)?;
        fsio::write_atomic(&self.config.vault_path(), token.as_bytes())?;
        tracing::info!(sites = vault.len(), "vault saved");
        Ok(())
    }

    /// Load the salt, derive the key from `pin` and decrypt.
    ///
    /// A fingerprint mismatch does not stop the unlock; it is reported in
    /// [`Unlocked::binding`] for the caller to act on.
    ///
    /// # Errors
    ///
    /// - [`VaultError::DecryptionFailure`] for a wrong PIN or damaged vault
    /// - [`VaultError::SaltMissingOrCorrupt`] for an unreadable salt file
    /// - anything [`load_salt`](Self::load_salt) returns
    pub fn unlock(&self, pin: SecretString) -> Result<Unlocked, VaultError> {
        let salt = self.load_salt()?;
        let key = self.derive_key(pin, &salt.salt)?;
        let vault = self.open_vault(key).inspect_err(|e| {
            if matches!(e, VaultError::DecryptionFailure) {
                tracing::warn!("unlock failed");
            }
        })?;
        tracing::info!(sites = vault.len(), binding = ?salt.binding, "vault unlocked");
        Ok(Unlocked {
            vault,
            binding: salt.binding,
            created: salt.created,
        })
    }

    /// Re-derive the key from `pin` and save `vault`.
    ///
    /// When a vault file already exists the derived key must open it before
    /// anything is written, so a mistyped PIN cannot re-key the vault. The
    /// check reuses the key and costs one AES-GCM open, not a second KDF run.
    ///
    /// # Errors
    ///
    /// - [`VaultError::WrongPin`] if `pin` does not open the existing file;
    ///   nothing is written
    /// - as for [`load_salt`](Self::load_salt) and [`save_vault`](Self::save_vault)
    pub fn persist(&self, pin: SecretString, vault: &Vault) -> Result<(), VaultError> {
        let salt = self.load_salt()?;
        let key = self.derive_key(pin, &salt.salt)?;
        self.check_key(&key)?;
        self.save_vault(key, vault)
    }

    fn check_key(&self, key: &DerivedKey) -> Result<(), VaultError> {
        let bytes = match fs::read(self.config.vault_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        match open(key, &VaultToken::from_bytes(bytes)) {
            Ok(_plaintext) => Ok(()),
            Err(_) => {
                tracing::warn!("save refused: PIN does not open the current vault");
                Err(VaultError::WrongPin)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::add_entry;
    use crate::identity::FixedIdentity;
    use pinvault_crypto_core::Pbkdf2Params;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> VaultStore {
        let config = VaultConfig::in_dir(dir.path()).with_kdf(Pbkdf2Params::MINIMUM);
        VaultStore::new(config, FixedIdentity::new("machine-a")).unwrap()
    }

    fn pin(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[test]
    fn first_unlock_creates_salt_and_empty_vault() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(!store.is_initialized());

        let unlocked = store.unlock(pin("1234")).unwrap();
        assert!(unlocked.created);
        assert!(unlocked.authorized());
        assert!(unlocked.vault.is_empty());
        assert!(store.is_initialized());
        assert!(!store.vault_exists());
    }

    #[test]
    fn persist_then_unlock() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut vault = store.unlock(pin("1234")).unwrap().vault;
        add_entry(&mut vault, "example.com", "alice", "pw");
        store.persist(pin("1234"), &vault).unwrap();

        let reopened = store.unlock(pin("1234")).unwrap();
        assert!(!reopened.created);
        assert_eq!(reopened.vault, vault);
    }

    #[test]
    fn wrong_pin_fails_uniformly() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut vault = Vault::new();
        add_entry(&mut vault, "example.com", "alice", "pw");
        store.persist(pin("1234"), &vault).unwrap();

        let err = store.unlock(pin("9999")).unwrap_err();
        assert!(matches!(err, VaultError::DecryptionFailure));
    }

    #[test]
    fn truncated_vault_file_is_decryption_failure() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.persist(pin("1234"), &Vault::new()).unwrap();

        let path = store.config().vault_path();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        assert!(matches!(
            store.unlock(pin("1234")).unwrap_err(),
            VaultError::DecryptionFailure
        ));
    }

    #[test]
    fn kdf_below_floor_is_rejected_at_construction() {
        let dir = TempDir::new().unwrap();
        let config = VaultConfig::in_dir(dir.path()).with_kdf(Pbkdf2Params { iterations: 10 });
        let err = VaultStore::new(config, FixedIdentity::new("m")).unwrap_err();
        assert!(matches!(err, VaultError::Config(_)));
    }

    #[test]
    fn failed_save_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut vault = Vault::new();
        add_entry(&mut vault, "a.com", "u", "p");
        store.persist(pin("1234"), &vault).unwrap();
        let before = fs::read(store.config().vault_path()).unwrap();

        // Occupy the temp-file name with a directory so the write fails.
        let blocker = dir.path().join(".vault.enc.tmp");
        fs::create_dir(&blocker).unwrap();
        add_entry(&mut vault, "b.com", "u", "p");
        assert!(store.persist(pin("1234"), &vault).is_err());

        assert_eq!(fs::read(store.config().vault_path()).unwrap(), before);
        assert_eq!(vault.len(), 2);

        fs::remove_dir(&blocker).unwrap();
        store.persist(pin("1234"), &vault).unwrap();
        assert_eq!(store.unlock(pin("1234")).unwrap().vault, vault);
    }

    #[test]
    fn save_with_other_pin_is_refused() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.persist(pin("1234"), &Vault::new()).unwrap();
        let mut vault = store.unlock(pin("1234")).unwrap().vault;
        add_entry(&mut vault, "a.com", "u", "p");
        let before = fs::read(store.config().vault_path()).unwrap();

        let err = store.persist(pin("1243"), &vault).unwrap_err();
        assert!(matches!(err, VaultError::WrongPin));
        assert_eq!(fs::read(store.config().vault_path()).unwrap(), before);
        assert!(store.unlock(pin("1234")).unwrap().vault.is_empty());
    }

    #[test]
    fn mismatch_still_unlocks() {
        let dir = TempDir::new().unwrap();
        let home = store(&dir);
        let mut vault = Vault::new();
        add_entry(&mut vault, "a.com", "u", "p");
        home.persist(pin("1234"), &vault).unwrap();

        let config = VaultConfig::in_dir(dir.path()).with_kdf(Pbkdf2Params::MINIMUM);
        let away = VaultStore::new(config, FixedIdentity::new("machine-b")).unwrap();
        let unlocked = away.unlock(pin("1234")).unwrap();
        assert_eq!(unlocked.binding, Binding::Mismatch);
        assert!(!unlocked.authorized());
        assert_eq!(unlocked.vault, vault);
    }
}
