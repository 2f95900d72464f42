//! Salt file management and machine binding.
//!
//! ## File layout (version 1)
//!
//! ```text
//! "PVSL" | version u8 = 1 | salt_len u8 | salt (salt_len) | tag (32)
//! ```
//!
//! Older installs wrote headerless files: 16 raw salt bytes, or a 16/64-byte
//! salt followed by a 32-byte tag. Both are still read. A file that matches
//! nothing is reported as corrupt and left alone: regenerating it would make
//! the existing vault undecryptable.

use std::fs;
use std::path::{Path, PathBuf};

use pinvault_crypto_core::fingerprint::TAG_LEN;
use pinvault_crypto_core::{FingerprintTag, SecretBytes};

use crate::error::VaultError;
use crate::fsio;
use crate::identity::MachineIdentity;

/// Salt file magic.
pub const SALT_MAGIC: &[u8; 4] = b"PVSL";

/// Current salt file version.
pub const SALT_VERSION: u8 = 1;

/// Length of freshly generated salts.
pub const SALT_LEN: usize = 32;

const LEGACY_SHORT_SALT_LEN: usize = 16;
const LEGACY_LONG_SALT_LEN: usize = 64;
const ACCEPTED_SALT_LENS: [usize; 3] = [LEGACY_SHORT_SALT_LEN, SALT_LEN, LEGACY_LONG_SALT_LEN];

/// magic + version + salt_len
const HEADER_LEN: usize = 6;

const LEGACY_SHORT_TAGGED_LEN: usize = LEGACY_SHORT_SALT_LEN + TAG_LEN;
const LEGACY_LONG_TAGGED_LEN: usize = LEGACY_LONG_SALT_LEN + TAG_LEN;

/// How the stored salt relates to the current machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Stored tag matches this machine.
    Bound,
    /// Stored tag belongs to another machine (or the identifier changed).
    Mismatch,
    /// Legacy file without a tag.
    Unbound,
}

/// Result of [`SaltStore::get_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltLoad {
    /// The stored salt bytes, returned whatever the binding.
    pub salt: Vec<u8>,
    pub binding: Binding,
    /// `true` when this call created the file.
    pub created: bool,
}

impl SaltLoad {
    /// Whether the caller may treat this machine as the vault's home.
    /// Unbound legacy files carry no signal and are allowed.
    #[must_use]
    pub const fn authorized(&self) -> bool {
        matches!(self.binding, Binding::Bound | Binding::Unbound)
    }
}

/// A parsed salt file, in any supported layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltFile {
    pub salt: Vec<u8>,
    /// `None` for legacy salt-only files.
    pub tag: Option<FingerprintTag>,
    /// Headerless layout written by older versions.
    pub legacy: bool,
}

impl SaltFile {
    /// Parse any known layout.
    ///
    /// Layouts are told apart by length: 16, 48 and 96 bytes are legacy,
    /// everything else must carry the header.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::SaltMissingOrCorrupt`] for any other input.
    pub fn parse(bytes: &[u8]) -> Result<Self, VaultError> {
        match bytes.len() {
            LEGACY_SHORT_SALT_LEN => Ok(Self {
                salt: bytes.to_vec(),
                tag: None,
                legacy: true,
            }),
            LEGACY_SHORT_TAGGED_LEN | LEGACY_LONG_TAGGED_LEN => {
                let (salt, tag) = bytes.split_at(bytes.len().saturating_sub(TAG_LEN));
                Ok(Self {
                    salt: salt.to_vec(),
                    tag: Some(tag_from_slice(tag)?),
                    legacy: true,
                })
            }
            _ => Self::parse_v1(bytes),
        }
    }

    fn parse_v1(bytes: &[u8]) -> Result<Self, VaultError> {
        let corrupt = |why: &str| VaultError::SaltMissingOrCorrupt(why.into());

        if bytes.len() < HEADER_LEN || &bytes[..4] != SALT_MAGIC {
            return Err(corrupt("unrecognized salt file layout"));
        }
        if bytes[4] != SALT_VERSION {
            return Err(VaultError::SaltMissingOrCorrupt(format!(
                "unsupported salt file version {}",
                bytes[4]
            )));
        }
        let salt_len = usize::from(bytes[5]);
        if !ACCEPTED_SALT_LENS.contains(&salt_len) {
            return Err(corrupt("invalid salt length"));
        }
        let body = &bytes[HEADER_LEN..];
        if body.len().checked_sub(TAG_LEN) != Some(salt_len) {
            return Err(corrupt("truncated or oversized salt file"));
        }
        let (salt, tag) = body.split_at(salt_len);
        Ok(Self {
            salt: salt.to_vec(),
            tag: Some(tag_from_slice(tag)?),
            legacy: false,
        })
    }

    /// Serialize as version 1. Only tagged files are ever written.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::SaltMissingOrCorrupt`] for a salt length the
    /// layout cannot carry.
    pub fn encode(salt: &[u8], tag: &FingerprintTag) -> Result<Vec<u8>, VaultError> {
        if !ACCEPTED_SALT_LENS.contains(&salt.len()) {
            return Err(VaultError::SaltMissingOrCorrupt(format!(
                "cannot store a {}-byte salt",
                salt.len()
            )));
        }
        let mut out =
            Vec::with_capacity(HEADER_LEN.saturating_add(salt.len()).saturating_add(TAG_LEN));
        out.extend_from_slice(SALT_MAGIC);
        out.push(SALT_VERSION);
        // Checked above: the length is one of 16, 32, 64.
        #[allow(clippy::cast_possible_truncation)]
        out.push(salt.len() as u8);
        out.extend_from_slice(salt);
        out.extend_from_slice(tag.as_bytes());
        Ok(out)
    }
}

fn tag_from_slice(bytes: &[u8]) -> Result<FingerprintTag, VaultError> {
    let tag: [u8; TAG_LEN] = bytes
        .try_into()
        .map_err(|_| VaultError::SaltMissingOrCorrupt("bad tag length".into()))?;
    Ok(FingerprintTag::from_bytes(tag))
}

/// Generate a fresh random salt without persisting it.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if the OS CSPRNG fails.
pub fn generate_salt() -> Result<Vec<u8>, VaultError> {
    let salt = SecretBytes::<SALT_LEN>::random()?;
    Ok(salt.expose().to_vec())
}

/// Current machine's fingerprint tag.
pub(crate) fn current_tag(identity: &dyn MachineIdentity) -> Result<FingerprintTag, VaultError> {
    let raw = identity.raw_machine_id()?;
    Ok(FingerprintTag::of_machine_id(&raw))
}

/// The salt file plus the machine identity it is checked against.
pub struct SaltStore<'a> {
    path: PathBuf,
    identity: &'a dyn MachineIdentity,
}

impl<'a> SaltStore<'a> {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, identity: &'a dyn MachineIdentity) -> Self {
        Self {
            path: path.into(),
            identity,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the salt, creating and binding it on first use.
    ///
    /// An existing file is never rewritten here, whether or not its tag
    /// matches.
    ///
    /// # Errors
    ///
    /// - [`VaultError::SaltMissingOrCorrupt`] if the file exists but is unreadable as a salt file
    /// - [`VaultError::UnavailableIdentity`] if a tag must be computed and no identifier exists
    /// - [`VaultError::Io`] on filesystem errors
    pub fn get_or_create(&self) -> Result<SaltLoad, VaultError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return self.create(),
            Err(e) => return Err(e.into()),
        };

        let file = SaltFile::parse(&bytes)?;
        let binding = match &file.tag {
            None => Binding::Unbound,
            Some(stored) if stored.matches(&current_tag(self.identity)?) => Binding::Bound,
            Some(_) => Binding::Mismatch,
        };
        match binding {
            Binding::Mismatch => {
                tracing::warn!(path = %self.path.display(), "salt fingerprint does not match this machine");
            }
            Binding::Unbound => {
                tracing::info!(path = %self.path.display(), "legacy salt file without fingerprint");
            }
            Binding::Bound => tracing::debug!("salt loaded"),
        }
        Ok(SaltLoad {
            salt: file.salt,
            binding,
            created: false,
        })
    }

    fn create(&self) -> Result<SaltLoad, VaultError> {
        // Identity first: nothing is written if it is unavailable.
        let tag = current_tag(self.identity)?;
        let salt = generate_salt()?;
        fsio::write_atomic(&self.path, &SaltFile::encode(&salt, &tag)?)?;
        tracing::info!(path = %self.path.display(), "created salt file");
        Ok(SaltLoad {
            salt,
            binding: Binding::Bound,
            created: true,
        })
    }

    /// Rewrite a legacy salt file in the version 1 layout.
    ///
    /// Salt bytes are kept. A stored tag is kept as-is; an unbound file gets
    /// the current machine's tag. Returns `false` when the file is already
    /// version 1.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] if there is no salt file, otherwise as for
    /// [`get_or_create`](Self::get_or_create).
    pub fn migrate_legacy(&self) -> Result<bool, VaultError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let file = SaltFile::parse(&bytes)?;
        if !file.legacy {
            return Ok(false);
        }
        let tag = match file.tag {
            Some(tag) => tag,
            None => current_tag(self.identity)?,
        };
        fsio::write_atomic(&self.path, &SaltFile::encode(&file.salt, &tag)?)?;
        tracing::info!(path = %self.path.display(), "migrated legacy salt file");
        Ok(true)
    }

    /// Remove the salt file. Missing is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] if removal fails.
    pub fn delete(&self) -> Result<(), VaultError> {
        fsio::remove_if_exists(&self.path)?;
        tracing::info!(path = %self.path.display(), "deleted salt file");
        Ok(())
    }
}
