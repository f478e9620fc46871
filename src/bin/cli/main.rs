//! CLI driver for syncrypto: parses argv into a [`config::SyncConfig`] and
//! hands it to the core, per spec.md §6's external interface.

mod config;
mod exit_codes;
mod password;
mod rule_file;

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use exit_codes::ExitCode;
use syncrypto::{crypto, FileEntry, Password, SyncEngine};

/// Two-way sync between a plaintext folder and an AES-encrypted folder.
#[derive(Parser)]
#[command(name = "syncrypto")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Folder holding the encrypted, opaque-named containers.
    encrypted_folder: Option<PathBuf>,

    /// Folder holding the user-editable plaintext files.
    plain_folder: Option<PathBuf>,

    /// Read the password from this file instead of prompting.
    #[arg(long)]
    password_file: Option<PathBuf>,

    /// Re-encrypt every file under a new password, then exit.
    #[arg(long)]
    change_password: bool,

    /// Print the in-memory encrypted tree and exit without syncing.
    #[arg(long)]
    print_encrypted_tree: bool,

    /// Decrypt a single container file, independent of either tree.
    #[arg(long)]
    decrypt_file: Option<PathBuf>,

    /// Encrypt a single file into container format, independent of either tree.
    #[arg(long)]
    encrypt_file: Option<PathBuf>,

    /// Destination for `--decrypt-file`/`--encrypt-file`.
    #[arg(long)]
    out_file: Option<PathBuf>,

    /// Repeat the sync every N seconds instead of running once.
    #[arg(long)]
    interval: Option<u64>,

    /// Load rules from this file instead of `<plain_folder>/.syncrypto/rules`.
    #[arg(long)]
    rule_file: Option<PathBuf>,

    /// Add one rule (`action: attr op value`); may be repeated.
    #[arg(long = "rule")]
    rules: Vec<String>,

    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    syncrypto::log_init::init(cli.debug);
    std::process::exit(run(cli).code());
}

fn run(cli: Cli) -> ExitCode {
    if cli.encrypt_file.is_some() || cli.decrypt_file.is_some() {
        return run_single_file(&cli);
    }

    let Some(encrypted_folder) = cli.encrypted_folder.clone() else {
        eprintln!("<encrypted_folder> is required");
        return ExitCode::Usage;
    };

    let password = match resolve_password(&cli) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("could not read password: {e}");
            return ExitCode::Usage;
        }
    };

    // These two operations only ever touch the encrypted side (the original
    // `Syncrypto` skips setting up a plaintext folder entirely when one
    // isn't given), so neither needs <plain_folder> nor the full sync
    // engine's plaintext-folder creation and rule-file setup.
    if cli.print_encrypted_tree {
        return print_encrypted_tree(&encrypted_folder, password.as_bytes());
    }

    if cli.change_password {
        if let Err(e) = syncrypto::sync::ensure_encrypted_folder(&encrypted_folder) {
            eprintln!("{e}");
            return exit_codes::error_to_exit_code(&e);
        }
        let new_password = match password::prompt_new_password() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("could not read new password: {e}");
                return ExitCode::Usage;
            }
        };
        return match syncrypto::sync::change_password_in_place(
            &encrypted_folder,
            password.as_bytes(),
            new_password.as_bytes(),
        ) {
            Ok(()) => ExitCode::Success,
            Err(e) => {
                eprintln!("{e}");
                exit_codes::error_to_exit_code(&e)
            }
        };
    }

    let Some(plain_folder) = cli.plain_folder.clone() else {
        eprintln!("<plain_folder> is required to sync");
        return ExitCode::Usage;
    };

    let rule_set = if cli.rules.is_empty() {
        None
    } else {
        match rule_file::rule_set_from_flags(&cli.rules) {
            Ok(set) => Some(set),
            Err(e) => {
                eprintln!("invalid --rule: {e}");
                return ExitCode::Usage;
            }
        }
    };

    let sync_config = config::SyncConfig {
        encrypted_folder,
        plain_folder,
        password,
        rule_set,
        rule_file: cli.rule_file.clone(),
    };
    let engine = match SyncEngine::new(
        sync_config.encrypted_folder,
        sync_config.plain_folder,
        sync_config.password,
        sync_config.rule_set,
        sync_config.rule_file,
    ) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{e}");
            return exit_codes::error_to_exit_code(&e);
        }
    };

    match cli.interval {
        Some(seconds) => loop {
            if let Err(e) = sync_once(&engine) {
                eprintln!("{e}");
                return exit_codes::error_to_exit_code(&e);
            }
            std::thread::sleep(Duration::from_secs(seconds));
        },
        None => match sync_once(&engine) {
            Ok(()) => ExitCode::Success,
            Err(e) => {
                eprintln!("{e}");
                exit_codes::error_to_exit_code(&e)
            }
        },
    }
}

fn sync_once(engine: &SyncEngine) -> syncrypto::Result<()> {
    let actions = engine.sync_folder()?;
    log::info!("synced {} pathnames", actions.len());
    Ok(())
}

fn print_encrypted_tree(encrypted_folder: &std::path::Path, password: &[u8]) -> ExitCode {
    match syncrypto::persistence::load_encrypted_tree(encrypted_folder, password) {
        Ok((tree, _, _)) => {
            print!("{tree}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("{e}");
            exit_codes::error_to_exit_code(&e)
        }
    }
}

fn resolve_password(cli: &Cli) -> std::io::Result<Password> {
    match &cli.password_file {
        Some(path) => password::read_password_file(path),
        None => password::prompt_password(),
    }
}

fn run_single_file(cli: &Cli) -> ExitCode {
    let Some(out_file) = cli.out_file.clone() else {
        eprintln!("--out-file is required with --encrypt-file/--decrypt-file");
        return ExitCode::Usage;
    };
    let password = match resolve_password(cli) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("could not read password: {e}");
            return ExitCode::Usage;
        }
    };

    if let Some(src_path) = &cli.encrypt_file {
        let pathname = src_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let mtime = std::fs::metadata(src_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let mut entry = FileEntry {
            pathname: pathname.clone(),
            fs_pathname: pathname,
            isdir: false,
            size: 0,
            mtime,
            ctime: mtime,
            mode: None,
            digest: None,
            salt: None,
        };
        let result = (|| -> syncrypto::Result<()> {
            let mut src = File::open(src_path)?;
            let mut dst = File::create(&out_file)?;
            crypto::encrypt_fd(&mut src, &mut dst, &mut entry, crypto::COMPRESS, password.as_bytes())
        })();
        return match result {
            Ok(()) => ExitCode::Success,
            Err(e) => {
                eprintln!("{e}");
                exit_codes::error_to_exit_code(&e)
            }
        };
    }

    if let Some(src_path) = &cli.decrypt_file {
        let result = (|| -> syncrypto::Result<()> {
            let mut src = File::open(src_path)?;
            let mut dst = File::create(&out_file)?;
            crypto::decrypt_fd(&mut src, &mut dst, password.as_bytes())?;
            Ok(())
        })();
        return match result {
            Ok(()) => ExitCode::Success,
            Err(e) => {
                eprintln!("{e}");
                exit_codes::error_to_exit_code(&e)
            }
        };
    }

    unreachable!("run_single_file only called when one of the two flags is set")
}
