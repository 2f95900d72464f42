mod fingerprint_sha256;
mod pbkdf2_sha256;
