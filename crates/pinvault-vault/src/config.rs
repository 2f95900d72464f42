//! Storage configuration: where the vault lives and how hard the KDF works.
//!
//! Nothing in the crate hard-codes a path. Callers build a [`VaultConfig`]
//! with [`VaultConfig::in_dir`] or load one from a JSON file written by
//! [`VaultConfig::save`].

use std::fs;
use std::path::{Path, PathBuf};

use pinvault_crypto_core::Pbkdf2Params;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::fsio;

/// Suffix of the staged files written during a PIN rotation.
pub(crate) const STAGED_SUFFIX: &str = ".new";

/// Vault storage configuration.
///
/// File names are relative to `vault_dir`; the backup directory may be
/// relative (to `vault_dir`) or absolute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    /// Directory holding the salt and vault files.
    pub vault_dir: PathBuf,

    /// Salt file name.
    #[serde(default = "default_salt_file")]
    pub salt_file: String,

    /// Encrypted vault file name.
    #[serde(default = "default_vault_file")]
    pub vault_file: String,

    /// Backup directory.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Key-derivation parameters.
    #[serde(default)]
    pub kdf: Pbkdf2Params,
}

fn default_salt_file() -> String {
    "salt.bin".into()
}
fn default_vault_file() -> String {
    "vault.enc".into()
}
fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

impl VaultConfig {
    /// Default file names and KDF parameters rooted at `vault_dir`.
    #[must_use]
    pub fn in_dir(vault_dir: impl Into<PathBuf>) -> Self {
        Self {
            vault_dir: vault_dir.into(),
            salt_file: default_salt_file(),
            vault_file: default_vault_file(),
            backup_dir: default_backup_dir(),
            kdf: Pbkdf2Params::default(),
        }
    }

    /// Replace the KDF parameters.
    #[must_use]
    pub const fn with_kdf(mut self, kdf: Pbkdf2Params) -> Self {
        self.kdf = kdf;
        self
    }

    #[must_use]
    pub fn salt_path(&self) -> PathBuf {
        self.vault_dir.join(&self.salt_file)
    }

    #[must_use]
    pub fn vault_path(&self) -> PathBuf {
        self.vault_dir.join(&self.vault_file)
    }

    /// Absolute, or relative to `vault_dir`.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.vault_dir.join(&self.backup_dir)
    }

    pub(crate) fn staged_salt_path(&self) -> PathBuf {
        self.vault_dir
            .join(format!("{}{STAGED_SUFFIX}", self.salt_file))
    }

    pub(crate) fn staged_vault_path(&self) -> PathBuf {
        self.vault_dir
            .join(format!("{}{STAGED_SUFFIX}", self.vault_file))
    }

    /// Check file names and the KDF floor.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] for an empty or path-like file name,
    /// identical salt and vault names, or iterations below the floor.
    pub fn validate(&self) -> Result<(), VaultError> {
        for (what, name) in [("salt", &self.salt_file), ("vault", &self.vault_file)] {
            if name.is_empty() {
                return Err(VaultError::Config(format!("{what} file name is empty")));
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(VaultError::Config(format!(
                    "{what} file name must be a plain file name: {name}"
                )));
            }
        }
        if self.salt_file == self.vault_file {
            return Err(VaultError::Config(
                "salt and vault file names must differ".into(),
            ));
        }
        self.kdf
            .validate()
            .map_err(|e| VaultError::Config(e.to_string()))
    }

    /// Read and validate a JSON config file.
    ///
    /// A broken file is an error, never a fallback to defaults.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] if the file is missing, [`VaultError::Config`]
    /// if it is unreadable JSON or fails [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self, VaultError> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| VaultError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Persist as pretty JSON with an atomic write.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if the config is invalid, or
    /// [`VaultError::Io`] if the write or rename fails.
    pub fn save(&self, path: &Path) -> Result<(), VaultError> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| VaultError::Config(e.to_string()))?;
        fsio::write_atomic(path, json.as_bytes())?;
        Ok(())
    }
}
