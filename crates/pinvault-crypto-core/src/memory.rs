//! Owners for secret bytes: PINs, derived keys, decrypted vault plaintext.
//!
//! Both owners zero their contents when dropped and try to pin their pages
//! in RAM. Pinning is best effort: an unprivileged process may have a tiny
//! `RLIMIT_MEMLOCK`, so callers can check [`SecretBuffer::is_mlocked`] but
//! never have to handle a failure.

use crate::error::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

fn fill_random(dest: &mut [u8]) -> Result<(), CryptoError> {
    OsRng
        .try_fill_bytes(dest)
        .map_err(|e| CryptoError::SecureMemory(format!("OS random source failed: {e}")))
}

/// Pages pinned with `mlock`, released again on drop.
pub struct LockedRegion {
    start: *const u8,
    len: usize,
    held: bool,
}

// SAFETY: `start` is an address handed to mlock/munlock and nothing else.
unsafe impl Send for LockedRegion {}
unsafe impl Sync for LockedRegion {}

impl LockedRegion {
    /// Pin `len` bytes starting at `start`. Empty ranges count as pinned.
    #[must_use]
    pub(crate) fn try_lock(start: *const u8, len: usize) -> Self {
        let held = len == 0 || pages::lock(start, len);
        Self { start, len, held }
    }

    const fn none() -> Self {
        Self {
            start: std::ptr::null(),
            len: 0,
            held: false,
        }
    }

    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.held
    }
}

impl Drop for LockedRegion {
    fn drop(&mut self) {
        if self.held && self.len > 0 {
            pages::unlock(self.start, self.len);
        }
    }
}

/// Variable-length secret on the heap, such as the decrypted vault JSON.
pub struct SecretBuffer {
    bytes: SecretSlice<u8>,
    pin: LockedRegion,
}

impl SecretBuffer {
    /// Copy `data` into a fresh allocation; `data` itself is left for the
    /// caller to wipe.
    ///
    /// # Errors
    ///
    /// Kept fallible for allocators that can refuse; currently always `Ok`.
    pub fn new(data: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self::from_vec(data.to_vec()))
    }

    /// Adopt `data` without copying.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        let bytes: SecretSlice<u8> = data.into();
        let view = bytes.expose_secret();
        let pin = LockedRegion::try_lock(view.as_ptr(), view.len());
        Self { bytes, pin }
    }

    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the OS random source fails.
    pub fn random(len: usize) -> Result<Self, CryptoError> {
        let mut data = vec![0u8; len];
        fill_random(&mut data)?;
        Ok(Self::from_vec(data))
    }

    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.bytes.expose_secret()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.expose().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    #[must_use]
    pub const fn is_mlocked(&self) -> bool {
        self.pin.is_locked()
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

/// Fixed-size secret held inline, e.g. the 32-byte vault key or a salt.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes<const N: usize> {
    bytes: [u8; N],
    #[zeroize(skip)]
    pin: LockedRegion,
}

impl<const N: usize> SecretBytes<N> {
    /// Take ownership of `data`.
    ///
    /// The pages are pinned where the array sits during this call. After a
    /// move that range no longer holds the secret; wiping on drop still
    /// follows the value.
    #[must_use]
    pub fn new(data: [u8; N]) -> Self {
        let mut secret = Self {
            bytes: data,
            pin: LockedRegion::none(),
        };
        secret.pin = LockedRegion::try_lock(secret.bytes.as_ptr(), N);
        secret
    }

    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` unless `data` is exactly
    /// `N` bytes long.
    pub fn try_from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        let mut scratch: [u8; N] = data.try_into().map_err(|_| {
            CryptoError::InvalidKeyMaterial(format!("expected {N} bytes, got {}", data.len()))
        })?;
        let secret = Self::new(scratch);
        scratch.zeroize();
        Ok(secret)
    }

    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the OS random source fails.
    pub fn random() -> Result<Self, CryptoError> {
        let mut scratch = [0u8; N];
        let filled = fill_random(&mut scratch).map(|()| Self::new(scratch));
        scratch.zeroize();
        filled
    }

    #[must_use]
    pub const fn expose(&self) -> &[u8; N] {
        &self.bytes
    }
}

impl<const N: usize> fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

/// Forbid core files for this process so a crash while unlocked cannot
/// leave the vault plaintext on disk. Does nothing on non-Unix targets.
///
/// # Errors
///
/// Returns `CryptoError::SecureMemory` if the limit cannot be lowered.
pub fn disable_core_dumps() -> Result<(), CryptoError> {
    if pages::forbid_core_files() {
        Ok(())
    } else {
        Err(CryptoError::SecureMemory(
            "setrlimit(RLIMIT_CORE, 0) was refused".into(),
        ))
    }
}

#[cfg(unix)]
mod pages {
    pub(super) fn lock(start: *const u8, len: usize) -> bool {
        // SAFETY: mlock only looks at the range; a bad range is ENOMEM.
        unsafe { libc::mlock(start.cast(), len) == 0 }
    }

    pub(super) fn unlock(start: *const u8, len: usize) {
        // SAFETY: same range that was passed to `lock`.
        let _ = unsafe { libc::munlock(start.cast(), len) };
    }

    pub(super) fn forbid_core_files() -> bool {
        let zero = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: `zero` is a valid rlimit for the duration of the call.
        unsafe { libc::setrlimit(libc::RLIMIT_CORE, &raw const zero) == 0 }
    }
}

#[cfg(not(unix))]
mod pages {
    pub(super) const fn lock(_start: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) const fn unlock(_start: *const u8, _len: usize) {}

    pub(super) const fn forbid_core_files() -> bool {
        true
    }
}
