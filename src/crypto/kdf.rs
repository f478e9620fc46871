//! Iterated-MD5 key and IV derivation.
//!
//! Matches the upstream container format's key schedule: the key material is
//! grown by repeatedly hashing `previous_digest || password || salt` until
//! there are enough bytes for the AES key plus the CBC IV, then split.
//! This is not a modern KDF (no configurable work factor, MD5 is fast to
//! brute-force) — it exists to read/write version-1 containers. A future
//! version-2 container could gate a PBKDF2/Argon2 derivation behind the
//! format's version byte.

use md5::{Digest, Md5};

const BLOCK_SIZE: usize = 16;

/// Derives `key_size` bytes of AES key followed by `BLOCK_SIZE` bytes of IV
/// from `password` and `salt`.
///
/// `key_size = 32` yields AES-256-CBC, the only mode this crate's container
/// format uses.
pub fn derive_key_and_iv(password: &[u8], salt: &[u8], key_size: usize) -> (Vec<u8>, [u8; 16]) {
    let mut output = Vec::with_capacity(key_size + BLOCK_SIZE);
    let mut prev: Vec<u8> = Vec::new();
    while output.len() < key_size + BLOCK_SIZE {
        let mut hasher = Md5::new();
        hasher.update(&prev);
        hasher.update(password);
        hasher.update(salt);
        prev = hasher.finalize().to_vec();
        output.extend_from_slice(&prev);
    }
    let key = output[..key_size].to_vec();
    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&output[key_size..key_size + BLOCK_SIZE]);
    (key, iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_deterministically() {
        let (key1, iv1) = derive_key_and_iv(b"hunter2", b"salt12345678", 32);
        let (key2, iv2) = derive_key_and_iv(b"hunter2", b"salt12345678", 32);
        assert_eq!(key1, key2);
        assert_eq!(iv1, iv2);
        assert_eq!(key1.len(), 32);
    }

    #[test]
    fn differs_by_password_and_salt() {
        let (key_a, _) = derive_key_and_iv(b"hunter2", b"salt12345678", 32);
        let (key_b, _) = derive_key_and_iv(b"hunter3", b"salt12345678", 32);
        assert_ne!(key_a, key_b);

        let (key_c, _) = derive_key_and_iv(b"hunter2", b"other_salt12", 32);
        assert_ne!(key_a, key_c);
    }
}
