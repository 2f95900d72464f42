//! Sanity checks on CSPRNG-backed outputs: salts, keys, generated passwords.
//!
//! Thresholds sit well below the expected Shannon entropy for each sample
//! size so natural variance never trips them; they catch degenerate output
//! such as all-zero buffers or a stuck generator.

use std::collections::HashSet;

use pinvault_crypto_core::memory::{SecretBuffer, SecretBytes};
use pinvault_crypto_core::password::generate_password;

#[allow(clippy::cast_precision_loss)]
fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut freq = [0u64; 256];
    for &b in data {
        freq[b as usize] = freq[b as usize].saturating_add(1);
    }
    let len = data.len() as f64;
    freq.iter()
        .filter(|&&f| f > 0)
        .map(|&f| {
            let p = f as f64 / len;
            -p * p.log2()
        })
        .sum()
}

#[test]
fn random_64kb_buffer_entropy() {
    let buf = SecretBuffer::random(65_536).expect("random should succeed");
    let h = shannon_entropy(buf.expose());
    assert!(h > 7.99, "entropy {h} too low for 64 KB of CSPRNG output");
}

#[test]
fn random_salts_do_not_repeat() {
    let salts: HashSet<[u8; 32]> = (0..1000)
        .map(|_| *SecretBytes::<32>::random().expect("random should succeed").expose())
        .collect();
    assert_eq!(salts.len(), 1000);
}

#[test]
fn generated_password_entropy() {
    // Uniform over 94 symbols → log2(94) ≈ 6.55 bits per character.
    let pw = generate_password(1024).expect("generation should succeed");
    let h = shannon_entropy(pw.as_bytes());
    assert!(h > 6.3, "password entropy {h} too low");
}
