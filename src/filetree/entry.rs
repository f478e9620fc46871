//! `FileEntry`: the canonical description of one file or directory on either
//! side of a sync.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Content digests above this many bytes are skipped during a scan; larger
/// files fall back to size+mtime comparison (spec's documented trade-off).
pub const DIGEST_SIZE_LIMIT: u64 = 10240;

/// One file or directory, as tracked by a `FileTree`.
///
/// `pathname` is the logical, forward-slash-separated path used as the map
/// key; `fs_pathname` is where the entry actually lives under its folder's
/// root, which for plaintext entries is always equal to `pathname` but for
/// encrypted entries is an opaque digest-prefix path (see `mapper.rs`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub pathname: String,
    pub fs_pathname: String,
    pub isdir: bool,
    pub size: u64,
    pub mtime: i64,
    pub ctime: i64,
    pub mode: Option<u32>,
    #[serde(with = "hex_digest", skip_serializing_if = "Option::is_none", default)]
    pub digest: Option<[u8; 16]>,
    #[serde(with = "hex_salt", skip_serializing_if = "Option::is_none", default)]
    pub salt: Option<[u8; 12]>,
}

impl FileEntry {
    /// Splits `pathname` into `(parent, basename)`; parent is `""` for a
    /// root-level entry.
    pub fn split(&self) -> (&str, &str) {
        match self.pathname.rfind('/') {
            Some(pos) => (&self.pathname[..pos], &self.pathname[pos + 1..]),
            None => ("", &self.pathname),
        }
    }

    /// Basename of `pathname`.
    pub fn name(&self) -> &str {
        self.split().1
    }

    /// Resolves this entry's on-disk location under `root`, translating the
    /// logical `/` separator to the host separator.
    pub fn fs_path(&self, root: &Path) -> std::path::PathBuf {
        root.join(self.fs_pathname.replace('/', std::path::MAIN_SEPARATOR_STR))
    }

    /// Builds an entry by `stat`-ing `path` and, for small files, computing
    /// its content digest. `fs_pathname` starts out equal to `pathname`;
    /// callers on the encrypted side overwrite it once the mapper assigns
    /// the opaque path.
    pub fn from_file(path: &Path, pathname: &str) -> Result<Self> {
        let meta = fs::symlink_metadata(path)?;
        let isdir = meta.is_dir();
        let size = if isdir { 0 } else { meta.len() };
        let mtime = file_time_or_zero(meta.modified().ok());
        let ctime = file_time_or_zero(meta.created().ok()).max(mtime);

        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            Some(meta.permissions().mode())
        };
        #[cfg(not(unix))]
        let mode = None;

        let digest = if !isdir && size <= DIGEST_SIZE_LIMIT {
            Some(digest_file(path)?)
        } else {
            None
        };

        Ok(FileEntry {
            pathname: pathname.to_string(),
            fs_pathname: pathname.to_string(),
            isdir,
            size,
            mtime,
            ctime,
            mode,
            digest,
            salt: None,
        })
    }

    /// Copies the mutable attributes of `target` onto `self`, preserving
    /// `self`'s `pathname`/`fs_pathname`. Used after a successful
    /// encrypt/decrypt transfer to bring the destination-side entry's
    /// bookkeeping fields in line with the source.
    pub fn copy_attr_from(&mut self, target: &FileEntry) {
        self.isdir = target.isdir;
        self.size = target.size;
        self.ctime = target.ctime;
        self.mtime = target.mtime;
        if target.mode.is_some() {
            self.mode = target.mode;
        }
        self.salt = target.salt;
        self.digest = target.digest;
    }
}

fn file_time_or_zero(t: Option<std::time::SystemTime>) -> i64 {
    t.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn digest_file(path: &Path) -> Result<[u8; 16]> {
    use md5::{Digest, Md5};
    let mut file = fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

mod hex_digest {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<[u8; 16]>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_str(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 16]>, D::Error> {
        let opt: Option<String> = Option::deserialize(d)?;
        opt.map(|s| {
            let v = hex::decode(&s).map_err(serde::de::Error::custom)?;
            v.try_into()
                .map_err(|_| serde::de::Error::custom("digest must be 16 bytes"))
        })
        .transpose()
    }
}

mod hex_salt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<[u8; 12]>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_str(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 12]>, D::Error> {
        let opt: Option<String> = Option::deserialize(d)?;
        opt.map(|s| {
            let v = hex::decode(&s).map_err(serde::de::Error::custom)?;
            v.try_into()
                .map_err(|_| serde::de::Error::custom("salt must be 12 bytes"))
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn from_file_digests_small_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.txt");
        std::fs::File::create(&small).unwrap().write_all(b"hi").unwrap();

        let entry = FileEntry::from_file(&small, "small.txt").unwrap();
        assert!(!entry.isdir);
        assert_eq!(entry.size, 2);
        assert!(entry.digest.is_some());
        assert_eq!(entry.fs_pathname, "small.txt");
    }

    #[test]
    fn split_separates_parent_and_name() {
        let entry = FileEntry {
            pathname: "a/b/c.txt".into(),
            fs_pathname: "a/b/c.txt".into(),
            isdir: false,
            size: 0,
            mtime: 0,
            ctime: 0,
            mode: None,
            digest: None,
            salt: None,
        };
        assert_eq!(entry.split(), ("a/b", "c.txt"));
        assert_eq!(entry.name(), "c.txt");
    }

    #[test]
    fn hex_projection_roundtrips_through_json() {
        let entry = FileEntry {
            pathname: "x".into(),
            fs_pathname: "x".into(),
            isdir: false,
            size: 5,
            mtime: 10,
            ctime: 10,
            mode: Some(0o644),
            digest: Some([1u8; 16]),
            salt: Some([2u8; 12]),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"digest\":\"0101010101010101010101010101"));
        let back: FileEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
