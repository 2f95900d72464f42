//! Machine fingerprint tags.
//!
//! A tag is `SHA-256(raw machine identifier)`. It is stored next to the salt
//! to notice a vault that moved hosts. It is never fed into key derivation.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of a fingerprint tag in bytes.
pub const TAG_LEN: usize = 32;

/// SHA-256 digest of a machine identifier.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FingerprintTag([u8; TAG_LEN]);

impl FingerprintTag {
    /// Hash a raw machine identifier.
    #[must_use]
    pub fn of_machine_id(raw_id: &str) -> Self {
        let digest = Sha256::digest(raw_id.as_bytes());
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&digest);
        Self(tag)
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; TAG_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TAG_LEN] {
        &self.0
    }

    /// Constant-time comparison.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl std::fmt::Debug for FingerprintTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First four bytes are enough to tell tags apart in logs.
        write!(
            f,
            "FingerprintTag({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}
