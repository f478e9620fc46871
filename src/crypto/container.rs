//! The container format: one `FileEntry`'s name, bytes and metadata wrapped
//! in AES-256-CBC with two MD5 integrity digests, byte-exact per the
//! version-1 wire format this crate must stay compatible with.
//!
//! ```text
//! offset  size  content
//! 0       1     version (currently 1)
//! 1       1     flags (bit 0 = COMPRESS)
//! 2       2     pathname length L (big-endian, <= 65535)
//! 4       12    salt
//! ----    cipherblock-aligned from here on
//! 16      P     encrypted pathname bytes, zero-padded to a multiple of 16
//! ...     N     encrypted payload (PKCS#7 padded)
//!         16    encrypted content digest (MD5 of the pre-compression plaintext)
//!         16    encrypted footer: size(u64 BE) | mtime(u32 BE) | mode(i32 BE)
//!         16    encrypted entire digest (MD5 of plaintext payload + footer)
//! ```

use std::io::{Read, Write};

use flate2::write::ZlibDecoder;
use md5::{Digest, Md5};
use rand::RngCore;

use crate::crypto::cipher::{strip_pkcs7, CbcDecryptor, CbcEncryptor};
use crate::crypto::compress::compress_fd;
use crate::crypto::kdf::derive_key_and_iv;
use crate::error::{Error, Result};
use crate::filetree::entry::FileEntry;

const VERSION: u8 = 1;

/// Set on the header's flags byte when the payload is zlib-compressed
/// before encryption.
pub const COMPRESS: u8 = 0x1;

const HEADER_SIZE: usize = 16;
const BLOCK_SIZE: usize = 16;
const TRAILER_SIZE: usize = 48; // content digest + footer + entire digest
const MAX_PATHNAME_LEN: usize = u16::MAX as usize;
const CHUNK_SIZE: usize = 16 * 1024;
/// Bytes of decrypted-but-not-yet-forwarded plaintext `decrypt_fd` must keep
/// buffered at all times: the fixed 48-byte trailer plus the one payload
/// block that might carry PKCS#7 padding, since neither can be told apart
/// from interior payload bytes until the stream ends.
const HOLDBACK: usize = TRAILER_SIZE + BLOCK_SIZE;

/// Reads through to a hasher and a byte counter as it forwards reads,
/// so the plaintext digest and size can be collected in one pass over the
/// source, regardless of whether that pass also feeds a zlib encoder.
struct DigestingReader<R> {
    inner: R,
    hasher: Md5,
    count: u64,
}

impl<R: Read> DigestingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Md5::new(),
            count: 0,
        }
    }
}

impl<R: Read> Read for DigestingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}

/// Forwards every byte written through it into the CBC stream and on to
/// `dst`, so a zlib encoder/decoder can sit directly in front of the cipher
/// instead of compressing into an intermediate buffer first.
struct CipherSink<'a, W> {
    cipher: &'a mut CbcEncryptor,
    dst: &'a mut W,
}

impl<W: Write> Write for CipherSink<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.dst.write_all(&self.cipher.update(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.dst.flush()
    }
}

/// Encrypts `src` into the container format on `dst`. Fills in `entry.salt`
/// (if not already set), `entry.digest` and `entry.size`, and streams the
/// payload through zlib first when `flags & COMPRESS` is set.
pub fn encrypt_fd<R: Read, W: Write>(
    src: R,
    mut dst: W,
    entry: &mut FileEntry,
    flags: u8,
    password: &[u8],
) -> Result<()> {
    if entry.salt.is_none() {
        let mut salt = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut salt);
        entry.salt = Some(salt);
    }
    let salt = entry.salt.expect("just assigned above");
    let (key, iv) = derive_key_and_iv(password, &salt, 32);
    let mut cipher = CbcEncryptor::new(&key, &iv);

    let mut pathname_bytes = entry.pathname.as_bytes().to_vec();
    if pathname_bytes.len() > MAX_PATHNAME_LEN {
        let start = pathname_bytes.len() - MAX_PATHNAME_LEN;
        pathname_bytes = pathname_bytes[start..].to_vec();
    }
    let pathname_len = pathname_bytes.len() as u16;

    dst.write_all(&[VERSION, flags])?;
    dst.write_all(&pathname_len.to_be_bytes())?;
    dst.write_all(&salt)?;

    let pad = (BLOCK_SIZE - pathname_bytes.len() % BLOCK_SIZE) % BLOCK_SIZE;
    pathname_bytes.extend(std::iter::repeat_n(0u8, pad));
    dst.write_all(&cipher.update(&pathname_bytes))?;

    let mut digesting = DigestingReader::new(src);
    if flags & COMPRESS != 0 {
        let mut sink = CipherSink {
            cipher: &mut cipher,
            dst: &mut dst,
        };
        compress_fd(&mut digesting, &mut sink)?;
        dst.write_all(&cipher.pad_and_flush())?;
    } else {
        stream_payload(&mut digesting, &mut cipher, &mut dst)?;
    }

    let content_digest: [u8; 16] = digesting.hasher.clone().finalize().into();
    let size = digesting.count;

    let mtime_u32 = entry.mtime.clamp(0, u32::MAX as i64) as u32;
    let mode_i32 = entry.mode.unwrap_or(0) as i32;
    let mut footer = Vec::with_capacity(16);
    footer.extend_from_slice(&size.to_be_bytes());
    footer.extend_from_slice(&mtime_u32.to_be_bytes());
    footer.extend_from_slice(&mode_i32.to_be_bytes());

    let mut entire_hasher = digesting.hasher;
    entire_hasher.update(&footer);
    let entire_digest: [u8; 16] = entire_hasher.finalize().into();

    dst.write_all(&cipher.update(&content_digest))?;
    dst.write_all(&cipher.update(&footer))?;
    dst.write_all(&cipher.update(&entire_digest))?;

    entry.digest = Some(content_digest);
    entry.size = size;
    Ok(())
}

/// Streams `src` through `cipher` in 16 KiB chunks, applying PKCS#7 padding
/// to the final block, writing ciphertext to `dst` as it becomes available.
fn stream_payload<R: Read, W: Write>(
    mut src: R,
    cipher: &mut CbcEncryptor,
    dst: &mut W,
) -> Result<()> {
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        dst.write_all(&cipher.update(&buf[..n]))?;
    }
    dst.write_all(&cipher.pad_and_flush())?;
    Ok(())
}

/// Counts and hashes every byte written through it on its way to `dst`, so
/// the content digest can be verified without re-reading the recovered
/// plaintext from disk.
struct DigestingWriter<W> {
    inner: W,
    hasher: Md5,
}

impl<W: Write> DigestingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Md5::new(),
        }
    }
}

impl<W: Write> Write for DigestingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.hasher.update(buf);
        self.inner.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// The final stretch of `decrypt_fd`'s pipeline: either the plaintext
/// payload goes straight to `dst` (tracked for its digest), or it's
/// zlib-compressed and must pass through a decoder first.
enum PayloadSink<W: Write> {
    Plain(DigestingWriter<W>),
    Compressed(ZlibDecoder<DigestingWriter<W>>),
}

impl<W: Write> PayloadSink<W> {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let result = match self {
            Self::Plain(w) => w.write_all(buf),
            Self::Compressed(z) => z.write_all(buf),
        };
        result.map_err(|e| Error::DecryptError(format!("failed writing decrypted payload: {e}")))
    }

    fn finish(self) -> Result<DigestingWriter<W>> {
        match self {
            Self::Plain(w) => Ok(w),
            Self::Compressed(z) => z
                .finish()
                .map_err(|e| Error::DecryptError(format!("zlib decompression failed: {e}"))),
        }
    }
}

/// Decrypts a container from `src`, verifying both digests, streaming the
/// recovered plaintext to `dst`. Returns a freshly-built `FileEntry`
/// describing the container's recorded pathname, size, mtime, mode, digest
/// and salt. Keeps only a small trailing window of decrypted bytes buffered
/// at any time (see [`HOLDBACK`]) rather than the whole ciphertext body, so
/// a multi-gigabyte container decrypts in bounded memory.
pub fn decrypt_fd<R: Read, W: Write>(mut src: R, dst: W, password: &[u8]) -> Result<FileEntry> {
    let mut header = [0u8; HEADER_SIZE];
    read_exact_or_err(&mut src, &mut header, "header")?;

    let version = header[0];
    if version > VERSION {
        return Err(Error::DecryptError(format!(
            "unsupported container version {version}"
        )));
    }
    let flags = header[1];
    let pathname_len = u16::from_be_bytes([header[2], header[3]]) as usize;
    let mut salt = [0u8; 12];
    salt.copy_from_slice(&header[4..16]);

    let (key, iv) = derive_key_and_iv(password, &salt, 32);
    let mut cipher = CbcDecryptor::new(&key, &iv);

    let pathname_block_len = block_align(pathname_len);
    let mut pathname_block = vec![0u8; pathname_block_len];
    read_exact_or_err(&mut src, &mut pathname_block, "pathname block")?;
    let pathname_plain = cipher.update(&pathname_block)?;
    let pathname = String::from_utf8(pathname_plain[..pathname_len].to_vec())
        .map_err(|_| Error::DecryptError("pathname bytes are not valid UTF-8".into()))?;

    let mut sink = if flags & COMPRESS != 0 {
        PayloadSink::Compressed(ZlibDecoder::new(DigestingWriter::new(dst)))
    } else {
        PayloadSink::Plain(DigestingWriter::new(dst))
    };

    // Everything decrypted beyond the last HOLDBACK bytes is guaranteed to
    // be interior payload (more ciphertext follows it), so it's forwarded
    // immediately; only a bounded tail stays buffered until the stream ends.
    let mut held: Vec<u8> = Vec::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        if n % BLOCK_SIZE != 0 {
            return Err(Error::DecryptError(
                "ciphertext length is not a multiple of the block size".into(),
            ));
        }
        held.extend(cipher.update(&buf[..n])?);
        if held.len() > HOLDBACK {
            let excess = held.len() - HOLDBACK;
            let forwarded: Vec<u8> = held.drain(..excess).collect();
            sink.write_all(&forwarded)?;
        }
    }

    if held.len() < TRAILER_SIZE {
        return Err(Error::DecryptError("container too short for its trailer".into()));
    }
    let split = held.len() - TRAILER_SIZE;
    let (padded_tail, trailer) = held.split_at(split);
    let content_digest = trailer[0..16].to_vec();
    let footer = trailer[16..32].to_vec();
    let entire_digest = trailer[32..48].to_vec();

    let final_payload = strip_pkcs7(padded_tail.to_vec())?;
    sink.write_all(&final_payload)?;

    let digesting = sink.finish()?;
    let actual_content_digest = digesting.hasher.clone().finalize();
    if actual_content_digest.as_slice() != content_digest.as_slice() {
        return Err(Error::DecryptError("content digest mismatch".into()));
    }

    let mut entire_hasher = digesting.hasher;
    entire_hasher.update(&footer);
    let actual_entire_digest = entire_hasher.finalize();
    if actual_entire_digest.as_slice() != entire_digest.as_slice() {
        return Err(Error::DecryptError("entire digest mismatch".into()));
    }

    let size = u64::from_be_bytes(footer[0..8].try_into().unwrap());
    let mtime = u32::from_be_bytes(footer[8..12].try_into().unwrap()) as i64;
    let mode_raw = i32::from_be_bytes(footer[12..16].try_into().unwrap());
    let mode = if mode_raw == 0 { None } else { Some(mode_raw as u32) };

    Ok(FileEntry {
        pathname: pathname.clone(),
        fs_pathname: pathname,
        isdir: false,
        size,
        mtime,
        ctime: mtime,
        mode,
        digest: Some(content_digest.try_into().unwrap()),
        salt: Some(salt),
    })
}

fn block_align(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

fn read_exact_or_err<R: Read>(src: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = src.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(Error::DecryptError(format!(
                "unexpected end of stream reading {what}: got {filled} of {} bytes",
                buf.len()
            )));
        }
        filled += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pathname: &str) -> FileEntry {
        FileEntry {
            pathname: pathname.to_string(),
            fs_pathname: pathname.to_string(),
            isdir: false,
            size: 0,
            mtime: 1_700_000_000,
            ctime: 1_700_000_000,
            mode: Some(0o644),
            digest: None,
            salt: None,
        }
    }

    #[test]
    fn roundtrips_plain_payload() {
        let mut e = entry("docs/readme.txt");
        let plaintext = b"hello world".to_vec();
        let mut ciphertext = Vec::new();
        encrypt_fd(plaintext.as_slice(), &mut ciphertext, &mut e, 0, b"hunter2").unwrap();

        let mut out = Vec::new();
        let decoded = decrypt_fd(ciphertext.as_slice(), &mut out, b"hunter2").unwrap();
        assert_eq!(out, plaintext);
        assert_eq!(decoded.pathname, "docs/readme.txt");
        assert_eq!(decoded.size, plaintext.len() as u64);
        assert_eq!(decoded.digest, e.digest);
    }

    #[test]
    fn roundtrips_compressed_payload() {
        let mut e = entry("big.txt");
        let plaintext = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".repeat(200);
        let mut ciphertext = Vec::new();
        encrypt_fd(plaintext.as_slice(), &mut ciphertext, &mut e, COMPRESS, b"hunter2").unwrap();

        let mut out = Vec::new();
        let decoded = decrypt_fd(ciphertext.as_slice(), &mut out, b"hunter2").unwrap();
        assert_eq!(out, plaintext);
        assert_eq!(decoded.size, plaintext.len() as u64);
    }

    #[test]
    fn wrong_password_fails_to_decrypt() {
        let mut e = entry("secret.txt");
        let plaintext = b"classified".to_vec();
        let mut ciphertext = Vec::new();
        encrypt_fd(plaintext.as_slice(), &mut ciphertext, &mut e, 0, b"correct horse").unwrap();

        let mut out = Vec::new();
        let err = decrypt_fd(ciphertext.as_slice(), &mut out, b"wrong password").unwrap_err();
        assert!(matches!(err, Error::DecryptError(_)));
    }

    #[test]
    fn same_salt_is_deterministic() {
        let mut e1 = entry("a");
        e1.salt = Some([7u8; 12]);
        let mut e2 = entry("a");
        e2.salt = Some([7u8; 12]);

        let mut c1 = Vec::new();
        let mut c2 = Vec::new();
        encrypt_fd(b"same bytes".as_slice(), &mut c1, &mut e1, 0, b"pw").unwrap();
        encrypt_fd(b"same bytes".as_slice(), &mut c2, &mut e2, 0, b"pw").unwrap();
        assert_eq!(c1, c2);
    }

    #[test]
    fn short_header_is_rejected() {
        let mut out = Vec::new();
        let err = decrypt_fd([0u8; 4].as_slice(), &mut out, b"pw").unwrap_err();
        assert!(matches!(err, Error::DecryptError(_)));
    }

    #[test]
    fn empty_payload_roundtrips() {
        let mut e = entry("empty.txt");
        let mut ciphertext = Vec::new();
        encrypt_fd([].as_slice(), &mut ciphertext, &mut e, 0, b"pw").unwrap();
        let mut out = Vec::new();
        let decoded = decrypt_fd(ciphertext.as_slice(), &mut out, b"pw").unwrap();
        assert!(out.is_empty());
        assert_eq!(decoded.size, 0);
    }
}
