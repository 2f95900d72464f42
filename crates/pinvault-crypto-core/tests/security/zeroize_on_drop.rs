//! Check that key material and decrypted plaintext are wiped on drop.
//!
//! These read memory after the owning value is gone, which is undefined
//! behaviour in the strict sense. They are smoke tests meant for the debug
//! profile: the inline `[u8; N]` of `SecretBytes` stays addressable in the
//! same stack frame, and heap buffers are scanned for a sentinel rather than
//! asserted all-zero (the allocator may reuse freed blocks for metadata).

use pinvault_crypto_core::kdf::{derive, DerivedKey, Pbkdf2Params};
use pinvault_crypto_core::memory::{SecretBuffer, SecretBytes};
use pinvault_crypto_core::token;
use pinvault_crypto_core::SecretString;

const SENTINEL: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

#[test]
fn secret_bytes_zeroed_after_drop() {
    let data_ptr: *const u8;
    {
        let key = SecretBytes::<32>::new([0xAB; 32]);
        data_ptr = key.expose().as_ptr();
        assert_eq!(key.expose()[0], 0xAB);
    }

    // SAFETY: see module docs.
    let zeroed = unsafe { std::slice::from_raw_parts(data_ptr, 32).iter().all(|&b| b == 0) };
    assert!(zeroed, "SecretBytes<32> was not zeroed on drop");
}

#[test]
fn secret_buffer_sentinel_gone_after_drop() {
    let sentinel_data: Vec<u8> = SENTINEL.iter().copied().cycle().take(65_536).collect();
    let data_ptr: *const u8;
    let data_len: usize;
    {
        let buf = SecretBuffer::new(&sentinel_data).expect("allocation should succeed");
        data_ptr = buf.expose().as_ptr();
        data_len = buf.len();
    }

    // SAFETY: see module docs.
    let found = unsafe {
        std::slice::from_raw_parts(data_ptr, data_len)
            .windows(4)
            .any(|w| w == SENTINEL)
    };
    assert!(!found, "sentinel found in SecretBuffer memory after drop");
}

#[test]
fn derived_key_needs_drop() {
    assert!(std::mem::needs_drop::<DerivedKey>());
    assert!(std::mem::needs_drop::<SecretString>());
}

#[test]
fn derived_key_zeroed_after_drop() {
    let data_ptr: *const u8;
    let prefix: [u8; 8];
    {
        let key = derive(
            SecretString::from("1234".to_owned()),
            b"0123456789abcdef",
            &Pbkdf2Params::MINIMUM,
        )
        .expect("derive should succeed");
        data_ptr = key.expose().as_ptr();
        prefix = (&key.expose()[..8]).try_into().expect("8 bytes");
    }

    // SAFETY: see module docs.
    let still_there = unsafe { std::slice::from_raw_parts(data_ptr, 8) == prefix };
    assert!(!still_there, "derived key bytes survived drop");
}

#[test]
fn opened_plaintext_sentinel_gone_after_drop() {
    let key = DerivedKey::from_bytes([0x42; 32]);
    let sentinel_data: Vec<u8> = SENTINEL.iter().copied().cycle().take(4096).collect();
    let sealed = token::seal(&key, &sentinel_data).expect("seal should succeed");

    let data_ptr: *const u8;
    let data_len: usize;
    {
        let plain = token::open(&key, &sealed).expect("open should succeed");
        data_ptr = plain.expose().as_ptr();
        data_len = plain.len();
    }

    // SAFETY: see module docs.
    let found = unsafe {
        std::slice::from_raw_parts(data_ptr, data_len)
            .windows(4)
            .any(|w| w == SENTINEL)
    };
    assert!(!found, "sentinel found in opened plaintext after drop");
}
