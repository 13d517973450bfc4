//! GitHub releases download strategy.
//!
//! The stable version comes from the releases-latest page's `<title>` tag
//! (`"Release X.Y.Z · fsprojects/Paket"`); prereleases are found by
//! scanning the releases index for `Paket/tree/<version>"` occurrences.
//! Assets and the checksum manifest are fetched from the release download
//! URL for the resolved version.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::constants::{
    BOOTSTRAPPER_FILE_NAME, GITHUB_DOWNLOAD_BASE_URL, GITHUB_RELEASES_LATEST_URL,
    GITHUB_RELEASES_URL, GITHUB_TREE_MARKER, HASH_FILE_NAME, TOOL_FILE_NAME,
};
use crate::core::BootstrapError;
use crate::proxy::{FileSystemProxy, WebRequestProxy};
use crate::strategy::{DownloadStrategy, replace_binary};
use crate::verification::{HashFile, compute_sha256, file_matches_hash};
use crate::version::{max_version, version_satisfies};

pub struct GitHubStrategy {
    fs: Arc<dyn FileSystemProxy>,
    web: Arc<dyn WebRequestProxy>,
}

impl GitHubStrategy {
    pub fn new(fs: Arc<dyn FileSystemProxy>, web: Arc<dyn WebRequestProxy>) -> GitHubStrategy {
        GitHubStrategy { fs, web }
    }

    fn latest_stable(&self) -> Result<String> {
        let page = self.web.download_string(GITHUB_RELEASES_LATEST_URL)?;
        Ok(extract_title_version(&page).unwrap_or_default())
    }

    fn latest_prerelease(&self) -> Result<String> {
        let page = self.web.download_string(GITHUB_RELEASES_URL)?;
        Ok(extract_first_prerelease(&page).unwrap_or_default())
    }

    fn asset_url(version: &str, file: &str) -> String {
        format!("{GITHUB_DOWNLOAD_BASE_URL}/{version}/{file}")
    }

    /// Download to `temp` and verify against the manifest, retrying the
    /// download exactly once on a hash mismatch. A manifest without an
    /// entry for the tool means verification is skipped, not failed.
    fn fetch_verified(&self, url: &str, temp: &Path, hash_file: Option<&HashFile>) -> Result<()> {
        self.web.download_file(url, temp)?;
        let Some(hashes) = hash_file else {
            return Ok(());
        };

        match file_matches_hash(self.fs.as_ref(), temp, hashes, TOOL_FILE_NAME)? {
            None | Some(true) => return Ok(()),
            Some(false) => {
                warn!("hash verification failed for {url}, retrying download once");
            }
        }

        self.web.download_file(url, temp)?;
        match file_matches_hash(self.fs.as_ref(), temp, hashes, TOOL_FILE_NAME)? {
            None | Some(true) => Ok(()),
            Some(false) => {
                let actual = compute_sha256(self.fs.as_ref(), temp)?;
                let expected = hashes.lookup(TOOL_FILE_NAME).unwrap_or_default().to_string();
                Err(BootstrapError::HashMismatch {
                    file: TOOL_FILE_NAME.to_string(),
                    expected,
                    actual,
                }
                .into())
            }
        }
    }

    fn temp_download_path(&self, prefix: &str) -> PathBuf {
        self.fs.temp_path().join(format!("{prefix}-{}", Uuid::new_v4()))
    }
}

impl DownloadStrategy for GitHubStrategy {
    fn name(&self) -> &str {
        "GitHub"
    }

    fn can_download_hash_file(&self) -> bool {
        true
    }

    fn get_latest_version(&self, ignore_prerelease: bool) -> Result<String> {
        let stable = self.latest_stable()?;
        let candidates = if ignore_prerelease {
            vec![stable]
        } else {
            vec![self.latest_prerelease()?, stable]
        };
        max_version(candidates).ok_or_else(|| {
            BootstrapError::NoVersionFound {
                source_url: GITHUB_RELEASES_URL.to_string(),
            }
            .into()
        })
    }

    fn download_version(
        &self,
        version: &str,
        target: &Path,
        hash_file: Option<&HashFile>,
    ) -> Result<()> {
        let url = Self::asset_url(version, TOOL_FILE_NAME);
        let temp = self.temp_download_path("paket");

        let result = self
            .fetch_verified(&url, &temp, hash_file)
            .and_then(|()| self.fs.copy_file(&temp, target, true));

        // The temp file goes away on every path, including verification
        // failure.
        if self.fs.file_exists(&temp) {
            if let Err(err) = self.fs.delete_file(&temp) {
                warn!("could not remove temp download {}: {err}", temp.display());
            }
        }

        result.with_context(|| format!("failed to download paket {version} from GitHub"))
    }

    fn self_update(&self, version: &str) -> Result<()> {
        let exe = self.fs.executing_binary_path()?;
        let local = self.fs.local_file_version(&exe);
        if version_satisfies(&local, version) {
            info!("bootstrapper {local} is up to date");
            return Ok(());
        }

        let url = Self::asset_url(version, BOOTSTRAPPER_FILE_NAME);
        let temp = self.temp_download_path("paket.bootstrapper");
        self.web.download_file(&url, &temp)?;
        replace_binary(self.fs.as_ref(), &exe, &temp)
            .with_context(|| format!("failed to self-update to {version}"))
    }

    fn download_hash_file(&self, version: &str) -> Result<Option<HashFile>> {
        let url = Self::asset_url(version, HASH_FILE_NAME);
        // Deterministic temp path: re-running for the same version reuses
        // the same file name.
        let temp = self.fs.temp_path().join(format!("paket-sha256-{version}.txt"));
        self.web.download_file(&url, &temp)?;
        let lines = self.fs.read_all_lines(&temp)?;
        Ok(Some(HashFile::parse(lines)))
    }
}

/// `"<title>Release 2.57.1 · fsprojects/Paket</title>"` -> `"2.57.1"`:
/// the second whitespace-delimited token of the title text.
fn extract_title_version(page: &str) -> Option<String> {
    let start = page.find("<title>")? + "<title>".len();
    let end = page[start..].find("</title>")? + start;
    let title = &page[start..end];
    title.split_whitespace().nth(1).map(|v| v.to_string())
}

/// First `Paket/tree/<version>"` occurrence whose version contains a `-`.
fn extract_first_prerelease(page: &str) -> Option<String> {
    let mut rest = page;
    while let Some(at) = rest.find(GITHUB_TREE_MARKER) {
        let tail = &rest[at + GITHUB_TREE_MARKER.len()..];
        if let Some(quote) = tail.find('"') {
            let version = &tail[..quote];
            if version.contains('-') {
                return Some(version.to_string());
            }
            rest = &tail[quote..];
        } else {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryFileSystem, InMemoryWebRequest};
    use sha2::{Digest, Sha256};

    fn strategy(
        fs: Arc<InMemoryFileSystem>,
        web: Arc<InMemoryWebRequest>,
    ) -> GitHubStrategy {
        GitHubStrategy::new(fs, web)
    }

    fn sha256_hex(data: &[u8]) -> String {
        hex::encode_upper(Sha256::digest(data))
    }

    #[test]
    fn scrapes_stable_version_from_title() {
        assert_eq!(
            extract_title_version("<title>Release 2.57.1 · fsprojects/Paket</title>").as_deref(),
            Some("2.57.1")
        );
        assert_eq!(extract_title_version("<body>no title</body>"), None);
    }

    #[test]
    fn scrapes_first_prerelease_from_tree_links() {
        let page = r#"<a href="/fsprojects/Paket/tree/2.57.0">x</a>
                      <a href="/fsprojects/Paket/tree/3.0.0-alpha1">y</a>
                      <a href="/fsprojects/Paket/tree/3.0.0-beta2">z</a>"#;
        assert_eq!(extract_first_prerelease(page).as_deref(), Some("3.0.0-alpha1"));
        assert_eq!(extract_first_prerelease("nothing here"), None);
    }

    #[test]
    fn latest_version_prefers_higher_of_stable_and_prerelease() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
        web.stub_string(
            GITHUB_RELEASES_LATEST_URL,
            "<title>Release 2.57.1 · fsprojects/Paket</title>",
        );
        web.stub_string(
            GITHUB_RELEASES_URL,
            r#"<a href="/fsprojects/Paket/tree/3.0.0-alpha1">pre</a>"#,
        );
        let github = strategy(fs, web);

        assert_eq!(github.get_latest_version(false).unwrap(), "3.0.0-alpha1");
        assert_eq!(github.get_latest_version(true).unwrap(), "2.57.1");
    }

    #[test]
    fn download_without_hash_file_is_accepted() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
        let url = GitHubStrategy::asset_url("5.0.0", TOOL_FILE_NAME);
        web.stub_file(&url, b"tool-bytes".to_vec());
        let github = strategy(fs.clone(), web);

        let target = PathBuf::from("/work/paket.exe");
        github.download_version("5.0.0", &target, None).unwrap();
        assert_eq!(fs.file_content(&target).unwrap(), b"tool-bytes");
    }

    #[test]
    fn download_retries_once_on_hash_mismatch() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
        let url = GitHubStrategy::asset_url("5.0.0", TOOL_FILE_NAME);
        // First response is corrupt, second is good.
        web.stub_file_sequence(&url, vec![b"garbage".to_vec(), b"tool-bytes".to_vec()]);
        let hashes = HashFile::parse([format!("{} {}", sha256_hex(b"tool-bytes"), TOOL_FILE_NAME)]);
        let github = strategy(fs.clone(), web.clone());

        let target = PathBuf::from("/work/paket.exe");
        github.download_version("5.0.0", &target, Some(&hashes)).unwrap();

        assert_eq!(web.file_request_count(&url), 2);
        assert_eq!(fs.file_content(&target).unwrap(), b"tool-bytes");
    }

    #[test]
    fn download_fails_after_second_mismatch_and_cleans_temp() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
        let url = GitHubStrategy::asset_url("5.0.0", TOOL_FILE_NAME);
        web.stub_file(&url, b"garbage".to_vec());
        let hashes = HashFile::parse([format!("{} {}", sha256_hex(b"tool-bytes"), TOOL_FILE_NAME)]);
        let github = strategy(fs.clone(), web.clone());

        let target = PathBuf::from("/work/paket.exe");
        let err = github.download_version("5.0.0", &target, Some(&hashes)).unwrap_err();
        assert!(err.to_string().contains("failed to download"));
        assert_eq!(web.file_request_count(&url), 2);
        assert!(fs.file_content(&target).is_none());
        assert_eq!(fs.files_under(&fs.temp_path()).len(), 0);
    }

    #[test]
    fn self_update_skips_when_prefix_satisfied() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
        let exe = PathBuf::from("/install/paket.bootstrapper.exe");
        fs.add_file(&exe, b"old".to_vec());
        fs.set_executing_binary(&exe);
        fs.set_local_version(&exe, "1.2.3.4");
        let github = strategy(fs, web.clone());

        github.self_update("1.2.3").unwrap();
        assert!(web.requested_urls().is_empty());
    }

    #[test]
    fn self_update_swaps_binary_and_keeps_backup() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
        let exe = PathBuf::from("/install/paket.bootstrapper.exe");
        fs.add_file(&exe, b"old".to_vec());
        fs.set_executing_binary(&exe);
        fs.set_local_version(&exe, "1.0.0.0");
        let url = GitHubStrategy::asset_url("2.0.0", BOOTSTRAPPER_FILE_NAME);
        web.stub_file(&url, b"new".to_vec());
        let github = strategy(fs.clone(), web);

        github.self_update("2.0.0").unwrap();
        assert_eq!(fs.file_content(&exe).unwrap(), b"new");
        let backup = PathBuf::from("/install/paket.bootstrapper.exe.backup");
        assert_eq!(fs.file_content(&backup).unwrap(), b"old");
    }

    #[test]
    fn hash_file_is_downloaded_and_parsed() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
        let url = GitHubStrategy::asset_url("5.0.0", HASH_FILE_NAME);
        web.stub_file(&url, b"AAAA paket.exe\n".to_vec());
        let github = strategy(fs, web);

        let hashes = github.download_hash_file("5.0.0").unwrap().unwrap();
        assert_eq!(hashes.lookup("paket.exe"), Some("AAAA"));
    }
}
