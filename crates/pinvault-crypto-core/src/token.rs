//! `vault.enc` token format, a versioned AES-256-GCM envelope.
//!
//! # Layout
//!
//! ```text
//! Magic (4 B) | Version (1 B) | Created-at (u64 LE) | Nonce (12 B) | Ciphertext | Tag (16 B)
//! ```
//!
//! - **Magic**: `b"PVLT"`
//! - **Created-at**: unix seconds at sealing time
//! - The first 13 bytes are the AEAD associated data, so editing the
//!   version or timestamp breaks authentication like editing the ciphertext.
//!
//! [`open`] reports every failure as the same [`CryptoError::Decryption`]:
//! short input, bad magic, unknown version, wrong key or a flipped bit.

use crate::error::CryptoError;
use crate::kdf::DerivedKey;
use crate::memory::SecretBuffer;
use crate::symmetric::{self, SealedData, NONCE_LEN, TAG_LEN};

/// Magic bytes identifying a vault token.
pub const MAGIC: &[u8; 4] = b"PVLT";

/// Current token version.
pub const TOKEN_VERSION: u8 = 1;

const MAGIC_LEN: usize = 4;
const TIMESTAMP_LEN: usize = 8;

/// Magic + version + timestamp.
pub const HEADER_LEN: usize = MAGIC_LEN + 1 + TIMESTAMP_LEN;

/// Smallest well-formed token: header, nonce, empty ciphertext, tag.
const MIN_TOKEN_LEN: usize = HEADER_LEN + NONCE_LEN + TAG_LEN;

/// Encrypted, integrity-protected vault bytes as stored on disk.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultToken {
    bytes: Vec<u8>,
}

impl VaultToken {
    /// Wrap bytes read from disk. Nothing is validated until [`open`].
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Format version, if the header is present. Unauthenticated until opened.
    #[must_use]
    pub fn version(&self) -> Option<u8> {
        if self.bytes.len() < HEADER_LEN || &self.bytes[..MAGIC_LEN] != MAGIC {
            return None;
        }
        Some(self.bytes[MAGIC_LEN])
    }

    /// Sealing timestamp (unix seconds). Unauthenticated until opened.
    #[must_use]
    pub fn created_at(&self) -> Option<u64> {
        self.version()?;
        let start = MAGIC_LEN.saturating_add(1);
        let raw: [u8; TIMESTAMP_LEN] = self.bytes.get(start..HEADER_LEN)?.try_into().ok()?;
        Some(u64::from_le_bytes(raw))
    }
}

impl std::fmt::Debug for VaultToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultToken")
            .field("len", &self.bytes.len())
            .field("version", &self.version())
            .finish()
    }
}

/// Seal `plaintext` into a token stamped with the current time.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the cipher fails.
pub fn seal(key: &DerivedKey, plaintext: &[u8]) -> Result<VaultToken, CryptoError> {
    seal_at(key, plaintext, now_secs())
}

/// Seal with an explicit timestamp.
///
/// The header (magic, version, `created_at`) is written in clear and passed
/// to AES-GCM as associated data. Nothing in it is secret, but a reader must
/// be able to trust it: an attacker who could rewind `created_at` or bump the
/// version byte without breaking the tag could make an old vault pass for a
/// new one.
///
/// # Arguments
///
/// - `key`: the derived vault key
/// - `plaintext`: serialized vault contents
/// - `created_at`: unix seconds recorded in the header
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the cipher fails.
pub fn seal_at(
    key: &DerivedKey,
    plaintext: &[u8],
    created_at: u64,
) -> Result<VaultToken, CryptoError> {
    let header = encode_header(created_at);
    let sealed = symmetric::encrypt(plaintext, key.expose(), &header)?;

    let capacity = MIN_TOKEN_LEN.saturating_add(sealed.ciphertext.len());
    let mut bytes = Vec::with_capacity(capacity);
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&sealed.nonce);
    bytes.extend_from_slice(&sealed.ciphertext);
    bytes.extend_from_slice(&sealed.tag);
    Ok(VaultToken { bytes })
}

/// Authenticate and decrypt a token.
///
/// Length, magic and version are checked before the cipher runs, but a
/// failure at any of those steps returns the same error as a failed tag.
///
/// # Errors
///
/// Returns `CryptoError::Decryption` for every failure.
pub fn open(key: &DerivedKey, token: &VaultToken) -> Result<SecretBuffer, CryptoError> {
    let bytes = token.as_bytes();
    if bytes.len() < MIN_TOKEN_LEN || token.version() != Some(TOKEN_VERSION) {
        return Err(CryptoError::Decryption);
    }

    let (header, rest) = bytes.split_at(HEADER_LEN);
    let (nonce_bytes, rest) = rest.split_at(NONCE_LEN);
    let ct_len = rest
        .len()
        .checked_sub(TAG_LEN)
        .ok_or(CryptoError::Decryption)?;
    let (ciphertext, tag_bytes) = rest.split_at(ct_len);

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(nonce_bytes);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(tag_bytes);

    let sealed = SealedData {
        nonce,
        ciphertext: ciphertext.to_vec(),
        tag,
    };
    symmetric::decrypt(&sealed, key.expose(), header).map_err(|_| CryptoError::Decryption)
}

fn encode_header(created_at: u64) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..MAGIC_LEN].copy_from_slice(MAGIC);
    header[MAGIC_LEN] = TOKEN_VERSION;
    header[MAGIC_LEN.saturating_add(1)..].copy_from_slice(&created_at.to_le_bytes());
    header
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
