//! Error types for syncrypto operations.
//!
//! All fallible operations in this crate return `Result<T, Error>`. The
//! [`Error`] enum covers every failure mode named in the sync engine's
//! contract: bad container headers, folder layout violations, rule parsing
//! failures, and the handful of conditions that are specific to the
//! encrypted-pathname mapper and the change-password flow.

use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the crypto codec, file tree, rule engine and sync
/// engine.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Wraps [`std::io::Error`] for filesystem and stream failures.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure to serialize or deserialize a persisted tree.
    #[error("tree serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The container could not be decrypted: short header, unsupported
    /// version, non-UTF-8 pathname, misaligned ciphertext, digest mismatch,
    /// or a zlib failure while `COMPRESS` was set. A wrong password
    /// presents as this error (digest mismatch or zlib failure), since the
    /// codec has no way to distinguish "wrong key" from "corrupt file".
    #[error("failed to decrypt container: {0}")]
    DecryptError(String),

    /// Either folder does not look like the side it's supposed to be: a
    /// non-directory path, or a folder that already contains the other
    /// side's marker directory (e.g. an encrypted folder containing
    /// `.syncrypto/`).
    #[error("invalid folder configuration: {0}")]
    InvalidFolder(String),

    /// The path mapper exhausted the 32-character hex-digest budget without
    /// finding a free `fs_pathname` for an entry. The caller should skip
    /// this one file and continue the sync.
    #[error("could not generate an encrypted path for {0:?}")]
    GenerateEncryptedFilePathError(String),

    /// `change_password` was called with the new password equal to the old
    /// one.
    #[error("new password is the same as the current password")]
    ChangeTheSamePassword,

    /// A rule line didn't match either accepted grammar.
    #[error("invalid rule string: {0:?}")]
    InvalidRuleString(String),

    /// A `regexp` rule's pattern failed to compile.
    #[error("invalid regular expression {0:?}: {1}")]
    InvalidRegularExpression(String, String),
}
