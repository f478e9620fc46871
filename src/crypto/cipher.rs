//! Streaming AES-256-CBC block plumbing used by the container codec.
//!
//! The container format encrypts a single continuous CBC stream: the
//! zero-padded pathname block, the (optionally compressed) payload with
//! PKCS#7 padding, and the two digests plus footer, all chained under one
//! key/IV with no re-keying in between. [`CbcEncryptor`]/[`CbcDecryptor`]
//! expose that as incremental state machines rather than one-shot buffers,
//! so the codec can interleave padding decisions with arbitrary chunk
//! boundaries from the caller (see `container.rs`).

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::{Error, Result};

const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Incremental AES-256-CBC encryptor with manual PKCS#7 padding control.
pub struct CbcEncryptor {
    cipher: Aes256CbcEnc,
    buffer: Vec<u8>,
}

impl CbcEncryptor {
    pub fn new(key: &[u8], iv: &[u8; 16]) -> Self {
        Self {
            cipher: Aes256CbcEnc::new(key.into(), iv.into()),
            buffer: Vec::new(),
        }
    }

    /// Feeds `data` into the stream, returning the ciphertext for every
    /// complete 16-byte block now available. Any remainder stays buffered
    /// until a later call completes a block.
    pub fn update(&mut self, data: &[u8]) -> Vec<u8> {
        self.buffer.extend_from_slice(data);
        self.drain_complete_blocks()
    }

    fn drain_complete_blocks(&mut self) -> Vec<u8> {
        let complete = (self.buffer.len() / BLOCK_SIZE) * BLOCK_SIZE;
        if complete == 0 {
            return Vec::new();
        }
        let mut chunk: Vec<u8> = self.buffer.drain(..complete).collect();
        let out = self
            .cipher
            .encrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut chunk, complete)
            .expect("block-aligned buffer always encrypts under NoPadding")
            .to_vec();
        out
    }

    /// Applies PKCS#7 padding to whatever remains buffered (1..=16 bytes of
    /// padding, always appending a full padding block when the buffered
    /// remainder is itself block-aligned) and flushes it. Safe to keep
    /// calling `update` afterwards for block-aligned trailers (digest,
    /// footer) since the buffer is empty again once this returns.
    pub fn pad_and_flush(&mut self) -> Vec<u8> {
        let pad_len = BLOCK_SIZE - (self.buffer.len() % BLOCK_SIZE);
        self.buffer.extend(std::iter::repeat_n(pad_len as u8, pad_len));
        self.drain_complete_blocks()
    }
}

/// Incremental AES-256-CBC decryptor. Every call must be fed block-aligned
/// ciphertext (the container codec always reads in multiples of 16 bytes).
pub struct CbcDecryptor {
    cipher: Aes256CbcDec,
}

impl CbcDecryptor {
    pub fn new(key: &[u8], iv: &[u8; 16]) -> Self {
        Self {
            cipher: Aes256CbcDec::new(key.into(), iv.into()),
        }
    }

    /// Decrypts a block-aligned ciphertext chunk in place, returning the
    /// plaintext bytes (still possibly PKCS#7-padded; callers strip padding
    /// themselves once they know where the payload ends).
    pub fn update(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if data.len() % BLOCK_SIZE != 0 {
            return Err(Error::DecryptError(format!(
                "ciphertext chunk length {} is not a multiple of the AES block size",
                data.len()
            )));
        }
        let mut buf = data.to_vec();
        let len = buf.len();
        let out = self
            .cipher
            .decrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf[..len])
            .map_err(|e| Error::DecryptError(format!("CBC decryption failed: {e}")))?;
        Ok(out.to_vec())
    }
}

/// Strips trailing PKCS#7 padding from a fully-buffered payload.
pub fn strip_pkcs7(mut data: Vec<u8>) -> Result<Vec<u8>> {
    let pad_len = *data
        .last()
        .ok_or_else(|| Error::DecryptError("empty payload, no padding byte".into()))? as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return Err(Error::DecryptError(format!(
            "invalid PKCS#7 padding length {pad_len}"
        )));
    }
    let expected_start = data.len() - pad_len;
    if data[expected_start..].iter().any(|&b| b as usize != pad_len) {
        return Err(Error::DecryptError("malformed PKCS#7 padding".into()));
    }
    data.truncate(expected_start);
    Ok(data)
}
