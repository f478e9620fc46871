//! Password acquisition for CLI operations: from `--password-file`, or
//! interactively via `rpassword`.

use std::fs;
use std::path::Path;

use syncrypto::Password;

/// Reads a password from `path`: the whole file, minus a single trailing
/// `\n` or `\r\n`. Rejects an empty result.
pub fn read_password_file(path: &Path) -> std::io::Result<Password> {
    let raw = fs::read(path)?;
    let mut raw = raw.as_slice();
    if raw.last() == Some(&b'\n') {
        raw = &raw[..raw.len() - 1];
    }
    if raw.last() == Some(&b'\r') {
        raw = &raw[..raw.len() - 1];
    }
    if raw.is_empty() {
        return Err(std::io::Error::other("password file is empty"));
    }
    Ok(Password::new(raw.to_vec()))
}

/// Prompts once for a password on the terminal.
pub fn prompt_password() -> std::io::Result<Password> {
    let pwd = rpassword::prompt_password("Password: ")?;
    Ok(Password::new(pwd))
}

/// Prompts twice for a new password (for `--change-password`), rejecting a
/// mismatch or anything under six characters.
pub fn prompt_new_password() -> std::io::Result<Password> {
    loop {
        let first = rpassword::prompt_password("New password: ")?;
        if first.len() < 6 {
            eprintln!("Password must be at least 6 characters.");
            continue;
        }
        let second = rpassword::prompt_password("Confirm new password: ")?;
        if first != second {
            eprintln!("Passwords do not match, try again.");
            continue;
        }
        return Ok(Password::new(first));
    }
}
