//! # syncrypto
//!
//! Keeps a plaintext directory tree and an encrypted directory tree in
//! sync. The encrypted side conceals file names, contents and metadata
//! behind AES-256-CBC containers; a snapshot tree recorded next to the
//! plaintext folder lets a three-way diff tell "changed since last sync"
//! apart from "present since inception", so two-way syncs behave like
//! merges rather than last-writer-wins overwrites.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use syncrypto::{Password, SyncEngine};
//!
//! fn main() -> syncrypto::Result<()> {
//!     let mut engine = SyncEngine::new(
//!         "./encrypted",
//!         "./plain",
//!         Password::new("hunter2"),
//!         None,
//!         None,
//!     )?;
//!     engine.sync_folder()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! - [`crypto`] — the container codec: key derivation, streaming
//!   AES-256-CBC, zlib helpers, and the container header format.
//! - [`filetree`] — the flat pathname-to-entry map, the rule engine, and
//!   the filesystem scanner.
//! - [`mapper`] — deterministic assignment of opaque on-disk paths for
//!   encrypted entries.
//! - [`persistence`] — reading and writing the encrypted tree and the
//!   snapshot tree to their fixed locations.
//! - [`sync`] — the engine that drives the diff, applies it to disk, and
//!   manages cross-process locking and trash.

pub mod crypto;
pub mod error;
pub mod filetree;
pub mod log_init;
pub mod mapper;
pub mod persistence;
pub mod sync;

pub use crypto::Password;
pub use error::{Error, Result};
pub use filetree::{FileEntry, FileRule, FileRuleSet, FileTree, RuleAction};
pub use sync::decision::SyncAction;
pub use sync::SyncEngine;
