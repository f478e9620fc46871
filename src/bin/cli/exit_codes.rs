//! Exit codes for the CLI tool, per spec.md §6.

use syncrypto::Error;

/// Process completed successfully.
pub const SUCCESS: i32 = 0;
/// Usage error, or a no-op invocation (help/version shown).
pub const USAGE: i32 = 1;
/// Container could not be decrypted: wrong password or corrupted data.
pub const DECRYPT_FAILURE: i32 = 3;
/// Either folder is laid out wrong for its side of the sync.
pub const INVALID_FOLDER: i32 = 4;

/// Structured counterpart to the raw exit code constants above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Usage,
    DecryptFailure,
    InvalidFolder,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::Usage => USAGE,
            Self::DecryptFailure => DECRYPT_FAILURE,
            Self::InvalidFolder => INVALID_FOLDER,
        }
    }
}

/// Maps a core `Error` to the exit code spec.md §6/§7 assigns it.
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error {
        Error::DecryptError(_) => ExitCode::DecryptFailure,
        Error::InvalidFolder(_) => ExitCode::InvalidFolder,
        Error::GenerateEncryptedFilePathError(_) => ExitCode::InvalidFolder,
        Error::ChangeTheSamePassword => ExitCode::Usage,
        Error::InvalidRuleString(_) | Error::InvalidRegularExpression(_, _) => ExitCode::Usage,
        Error::Io(_) | Error::Json(_) => ExitCode::InvalidFolder,
    }
}
