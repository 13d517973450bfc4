//! Filesystem collaborator interface.
//!
//! The strategy chain never touches `std::fs` directly; everything goes
//! through [`FileSystemProxy`] so tests can substitute an in-memory
//! implementation and the production code keeps a single place for
//! context-wrapped I/O.

use std::fs::{self, FileTimes};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::version::SemVer;

/// File and directory operations the bootstrapper consumes.
///
/// Path arguments are always absolute or caller-resolved; implementations
/// do not search.
pub trait FileSystemProxy: Send + Sync {
    fn file_exists(&self, path: &Path) -> bool;

    fn directory_exists(&self, path: &Path) -> bool;

    fn copy_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<()>;

    fn delete_file(&self, path: &Path) -> Result<()>;

    fn move_file(&self, from: &Path, to: &Path) -> Result<()>;

    fn create_directory(&self, path: &Path) -> Result<()>;

    fn delete_directory(&self, path: &Path, recursive: bool) -> Result<()>;

    /// Names (not paths) of the immediate subdirectories of `path`.
    fn get_directories(&self, path: &Path) -> Result<Vec<String>>;

    /// Files directly under `path` whose names match `pattern`, where the
    /// pattern contains at most one `*` wildcard (e.g. `paket.*.nupkg`).
    fn enumerate_files(&self, path: &Path, pattern: &str) -> Result<Vec<PathBuf>>;

    fn last_write_time(&self, path: &Path) -> Result<DateTime<Utc>>;

    /// Set last-write and last-access time to now.
    fn touch(&self, path: &Path) -> Result<()>;

    /// Version reported by the binary at `path`, empty when the file is
    /// missing or no version can be determined. Never an error: a missing
    /// local version is what first-run bootstrapping looks like.
    fn local_file_version(&self, path: &Path) -> String;

    fn read_all_lines(&self, path: &Path) -> Result<Vec<String>>;

    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    fn write_file(&self, path: &Path, contents: &str) -> Result<()>;

    fn temp_path(&self) -> PathBuf;

    /// Path of the currently running bootstrapper binary.
    fn executing_binary_path(&self) -> Result<PathBuf>;

    /// Extract a zip archive into `dest`, creating it as needed.
    fn extract_archive(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Production implementation over `std::fs`.
pub struct LocalFileSystem;

impl FileSystemProxy for LocalFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn copy_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<()> {
        if !overwrite && to.exists() {
            anyhow::bail!("destination already exists: {}", to.display());
        }
        fs::copy(from, to)
            .with_context(|| format!("failed to copy {} to {}", from.display(), to.display()))?;
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("failed to delete {}", path.display()))
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)
            .with_context(|| format!("failed to move {} to {}", from.display(), to.display()))
    }

    fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory {}", path.display()))
    }

    fn delete_directory(&self, path: &Path, recursive: bool) -> Result<()> {
        let result = if recursive { fs::remove_dir_all(path) } else { fs::remove_dir(path) };
        result.with_context(|| format!("failed to delete directory {}", path.display()))
    }

    fn get_directories(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = fs::read_dir(path)
            .with_context(|| format!("failed to list directory {}", path.display()))?;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn enumerate_files(&self, path: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
        let mut matches = Vec::new();
        let entries = fs::read_dir(path)
            .with_context(|| format!("failed to list directory {}", path.display()))?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if matches_pattern(&name, pattern) {
                matches.push(entry.path());
            }
        }
        Ok(matches)
    }

    fn last_write_time(&self, path: &Path) -> Result<DateTime<Utc>> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?;
        let modified = metadata
            .modified()
            .with_context(|| format!("no modification time for {}", path.display()))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn touch(&self, path: &Path) -> Result<()> {
        let now = SystemTime::now();
        let file = fs::OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open {} for touch", path.display()))?;
        file.set_times(FileTimes::new().set_accessed(now).set_modified(now))
            .with_context(|| format!("failed to touch {}", path.display()))
    }

    fn local_file_version(&self, path: &Path) -> String {
        if !path.is_file() {
            return String::new();
        }
        // The original product read a Win32 version resource; the portable
        // equivalent is asking the tool itself.
        let output = match Command::new(path).arg("--version").output() {
            Ok(output) => output,
            Err(err) => {
                debug!("could not probe {} for a version: {}", path.display(), err);
                return String::new();
            }
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        for token in stdout.split_whitespace() {
            if token.contains('.') && SemVer::create(token).is_ok() {
                return token.to_string();
            }
        }
        String::new()
    }

    fn read_all_lines(&self, path: &Path) -> Result<Vec<String>> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(contents.lines().map(|l| l.trim_end_matches('\r').to_string()).collect())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    fn temp_path(&self) -> PathBuf {
        std::env::temp_dir()
    }

    fn executing_binary_path(&self) -> Result<PathBuf> {
        std::env::current_exe().context("failed to locate the running binary")
    }

    fn extract_archive(&self, archive: &Path, dest: &Path) -> Result<()> {
        let file = fs::File::open(archive)
            .with_context(|| format!("failed to open archive {}", archive.display()))?;
        let mut zip = zip::ZipArchive::new(file)
            .with_context(|| format!("failed to read archive {}", archive.display()))?;
        fs::create_dir_all(dest)
            .with_context(|| format!("failed to create directory {}", dest.display()))?;
        zip.extract(dest)
            .with_context(|| format!("failed to extract {} to {}", archive.display(), dest.display()))
    }
}

/// Match a file name against a pattern with at most one `*` wildcard.
pub(crate) fn matches_pattern(name: &str, pattern: &str) -> bool {
    match pattern.split_once('*') {
        None => name == pattern,
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn pattern_matching_handles_single_wildcard() {
        assert!(matches_pattern("paket.5.0.0.nupkg", "paket.*.nupkg"));
        assert!(matches_pattern("paket.core.nupkg", "paket.*.nupkg"));
        assert!(!matches_pattern("other.5.0.0.nupkg", "paket.*.nupkg"));
        assert!(!matches_pattern("paket.nupkg", "paket.*.nupkg"));
        assert!(matches_pattern("exact.txt", "exact.txt"));
    }

    #[test]
    fn enumerate_files_filters_by_pattern() {
        let dir = TempDir::new().unwrap();
        let fs_proxy = LocalFileSystem;
        std::fs::write(dir.path().join("paket.5.0.0.nupkg"), b"x").unwrap();
        std::fs::write(dir.path().join("readme.md"), b"x").unwrap();

        let found = fs_proxy.enumerate_files(dir.path(), "paket.*.nupkg").unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("paket.5.0.0.nupkg"));
    }

    #[test]
    fn touch_moves_the_write_time_forward() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("target");
        std::fs::write(&file, b"x").unwrap();
        let fs_proxy = LocalFileSystem;

        let old = Utc::now() - chrono::Duration::hours(1);
        let old_st = SystemTime::from(old);
        let handle = std::fs::OpenOptions::new().write(true).open(&file).unwrap();
        handle.set_times(FileTimes::new().set_modified(old_st)).unwrap();
        drop(handle);

        let before = fs_proxy.last_write_time(&file).unwrap();
        fs_proxy.touch(&file).unwrap();
        let after = fs_proxy.last_write_time(&file).unwrap();
        assert!(after > before);
    }

    #[test]
    fn missing_binary_has_no_local_version() {
        let dir = TempDir::new().unwrap();
        let fs_proxy = LocalFileSystem;
        assert_eq!(fs_proxy.local_file_version(&dir.path().join("absent")), "");
    }

    #[test]
    fn read_all_lines_accepts_crlf() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("hashes.txt");
        std::fs::write(&file, "AAAA paket.exe\r\nBBBB other.exe\n").unwrap();
        let fs_proxy = LocalFileSystem;

        let lines = fs_proxy.read_all_lines(&file).unwrap();
        assert_eq!(lines, vec!["AAAA paket.exe", "BBBB other.exe"]);
    }
}
