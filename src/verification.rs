//! SHA-256 hash files and content verification.
//!
//! Releases publish a checksum manifest (`paket-sha256.txt`) with one
//! entry per line: `"<64-hex-char-uppercase-SHA256> <filename>"`. Both
//! CRLF and LF line endings are accepted on read, comparisons are
//! case-insensitive, and a duplicated filename resolves to its last
//! occurrence — the manifest is taken as-is, not deduplicated.

use std::path::Path;

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::proxy::FileSystemProxy;

/// A parsed checksum manifest.
#[derive(Debug, Clone)]
pub struct HashFile {
    /// `(hash, filename)` pairs in file order.
    entries: Vec<(String, String)>,
}

impl HashFile {
    /// Parse manifest lines. Lines that do not contain exactly a hash and
    /// a filename are skipped.
    pub fn parse<I, S>(lines: I) -> HashFile
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        for line in lines {
            let line = line.as_ref().trim_end_matches('\r');
            let mut parts = line.split_whitespace();
            if let (Some(hash), Some(file), None) = (parts.next(), parts.next(), parts.next()) {
                entries.push((hash.to_string(), file.to_string()));
            }
        }
        HashFile { entries }
    }

    /// Expected hash for `filename`; the last occurrence wins when the
    /// manifest repeats a name.
    pub fn lookup(&self, filename: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(_, file)| file == filename)
            .map(|(hash, _)| hash.as_str())
    }

    /// Re-serialize the manifest for caching on disk.
    pub fn content(&self) -> String {
        let mut out = String::new();
        for (hash, file) in &self.entries {
            out.push_str(hash);
            out.push(' ');
            out.push_str(file);
            out.push('\n');
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compute the SHA-256 of a file as uppercase hex, matching the manifest
/// format.
pub fn compute_sha256(fs: &dyn FileSystemProxy, path: &Path) -> Result<String> {
    let contents = fs.read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&contents);
    Ok(hex::encode_upper(hasher.finalize()))
}

/// Whether the file at `path` matches the manifest entry for `entry_name`.
///
/// Returns `None` when the manifest has no entry for `entry_name` — what
/// that means (skip verification vs. corruption) is the caller's call.
pub fn file_matches_hash(
    fs: &dyn FileSystemProxy,
    path: &Path,
    hash_file: &HashFile,
    entry_name: &str,
) -> Result<Option<bool>> {
    let Some(expected) = hash_file.lookup(entry_name) else {
        return Ok(None);
    };
    let actual = compute_sha256(fs, path)?;
    Ok(Some(actual.eq_ignore_ascii_case(expected)))
}
