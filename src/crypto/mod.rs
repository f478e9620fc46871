//! The cryptographic container codec: key derivation, streaming AES-256-CBC,
//! zlib helpers and the container header format.

pub mod cipher;
pub mod compress;
pub mod container;
pub mod kdf;

pub use compress::{compress_fd, decompress_fd};
pub use container::{decrypt_fd, encrypt_fd, COMPRESS};

/// A password, kept as raw bytes rather than `String` so callers aren't
/// tempted to treat it as displayable text. `Crypto.password` in the
/// upstream implementation is similarly encoded as `latin-1` bytes rather
/// than left as a native string.
#[derive(Clone)]
pub struct Password(Vec<u8>);

impl Password {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Password(s.into_bytes())
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Password(s.as_bytes().to_vec())
    }
}
