//! Caching decorator over an effective strategy.
//!
//! Downloads are cached on disk as `<cacheRoot>/<version>/paket.exe` next
//! to the version's checksum manifest `<cacheRoot>/<version>/paket-sha256.txt`.
//! A hash-valid cached copy short-circuits the effective strategy
//! entirely; an invalid one counts as a cache miss and is refreshed. When
//! this decorator is composed as the last resort of the chain, a
//! network failure during version resolution degrades to scanning the
//! cache for the highest version already on disk.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::constants::{HASH_FILE_NAME, TOOL_FILE_NAME};
use crate::core::{BootstrapError, is_network_error};
use crate::proxy::FileSystemProxy;
use crate::strategy::DownloadStrategy;
use crate::verification::{HashFile, file_matches_hash};
use crate::version::SemVer;

pub struct CacheStrategy {
    inner: Box<dyn DownloadStrategy>,
    fs: Arc<dyn FileSystemProxy>,
    cache_dir: PathBuf,
    /// Set by the composition root on the last node of the chain: with no
    /// further fallback configured, a network failure degrades to the
    /// local cache scan instead of propagating.
    fall_back_to_cache: bool,
    name: String,
}

impl CacheStrategy {
    /// Wrap an effective strategy.
    ///
    /// Fails when the wrapped strategy already delegates to a fallback:
    /// caching in front of a fallback pair would silently bypass the
    /// fallback on every cache hit.
    pub fn new(
        inner: Box<dyn DownloadStrategy>,
        fs: Arc<dyn FileSystemProxy>,
        cache_dir: PathBuf,
    ) -> Result<CacheStrategy> {
        if inner.has_fallback() {
            anyhow::bail!("a cached strategy must wrap a strategy without its own fallback");
        }
        let name = format!("{} - cached", inner.name());
        Ok(CacheStrategy {
            inner,
            fs,
            cache_dir,
            fall_back_to_cache: false,
            name,
        })
    }

    /// Degrade to the cache scan on network failure. Only the last node
    /// of the chain gets this.
    pub fn use_cache_as_last_resort(mut self) -> CacheStrategy {
        self.fall_back_to_cache = true;
        self
    }

    fn version_dir(&self, version: &str) -> PathBuf {
        self.cache_dir.join(version)
    }

    fn cached_tool(&self, version: &str) -> PathBuf {
        self.version_dir(version).join(TOOL_FILE_NAME)
    }

    fn cached_hash_path(&self, version: &str) -> PathBuf {
        self.version_dir(version).join(HASH_FILE_NAME)
    }

    /// The cached checksum manifest for a version, when one exists.
    ///
    /// A manifest that exists but lacks the `paket.exe` entry is corrupt —
    /// its format is broken, not merely its content stale — so it is
    /// deleted and a hard error is raised.
    fn cached_hashes(&self, version: &str) -> Result<Option<HashFile>> {
        let path = self.cached_hash_path(version);
        if !self.fs.file_exists(&path) {
            return Ok(None);
        }
        let hashes = HashFile::parse(self.fs.read_all_lines(&path)?);
        if hashes.lookup(TOOL_FILE_NAME).is_none() {
            if let Err(err) = self.fs.delete_file(&path) {
                warn!("could not delete corrupt hash file {}: {err}", path.display());
            }
            return Err(BootstrapError::CacheCorruption {
                path: path.display().to_string(),
                entry: TOOL_FILE_NAME.to_string(),
            }
            .into());
        }
        Ok(Some(hashes))
    }

    /// Highest version present in the cache. Subdirectory names that fail
    /// to parse sort as the zero version: they never crash resolution and
    /// never beat a valid version.
    fn latest_from_cache(&self) -> Option<String> {
        let names = self.fs.get_directories(&self.cache_dir).ok()?;
        let mut best: Option<SemVer> = None;
        for name in names {
            let parsed = SemVer::create(&name).unwrap_or_else(|_| SemVer::zero(&name));
            let better = match &best {
                None => true,
                Some(current) => parsed.compare(current) == Ordering::Greater,
            };
            if better {
                best = Some(parsed);
            }
        }
        best.map(|v| v.original)
    }
}

impl DownloadStrategy for CacheStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_download_hash_file(&self) -> bool {
        self.inner.can_download_hash_file()
    }

    fn get_latest_version(&self, ignore_prerelease: bool) -> Result<String> {
        match self.inner.get_latest_version(ignore_prerelease) {
            Ok(version) => Ok(version),
            Err(err) if self.fall_back_to_cache && is_network_error(&err) => {
                match self.latest_from_cache() {
                    Some(version) => {
                        warn!(
                            "{} is unreachable ({err}), using cached version {version}",
                            self.inner.name()
                        );
                        Ok(version)
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn download_version(
        &self,
        version: &str,
        target: &Path,
        hash_file: Option<&HashFile>,
    ) -> Result<()> {
        // Corruption of the cached manifest is a hard error on this call,
        // whether or not the cached binary exists.
        let hashes = self.cached_hashes(version)?;
        let cached = self.cached_tool(version);

        let cache_hit = self.fs.file_exists(&cached)
            && match &hashes {
                // No manifest in the cache: nothing to verify against.
                None => true,
                Some(h) => {
                    file_matches_hash(self.fs.as_ref(), &cached, h, TOOL_FILE_NAME)?
                        == Some(true)
                }
            };

        if cache_hit {
            debug!("copying paket {version} from cache");
            return self.fs.copy_file(&cached, target, true);
        }

        self.inner.download_version(version, target, hash_file)?;

        self.fs.create_directory(&self.version_dir(version))?;
        self.fs.copy_file(target, &cached, true)?;
        // The caller already holds a verified download; a bad cache copy
        // is worth a warning, not a failure.
        match &hashes {
            None => {}
            Some(h) => match file_matches_hash(self.fs.as_ref(), &cached, h, TOOL_FILE_NAME) {
                Ok(Some(true)) => {}
                Ok(_) => warn!("freshly cached copy of {version} does not match its hash file"),
                Err(err) => warn!("could not validate freshly cached copy of {version}: {err}"),
            },
        }
        Ok(())
    }

    fn self_update(&self, version: &str) -> Result<()> {
        // The bootstrapper binary itself is never cached.
        self.inner.self_update(version)
    }

    fn download_hash_file(&self, version: &str) -> Result<Option<HashFile>> {
        let path = self.cached_hash_path(version);
        if self.fs.file_exists(&path) {
            return Ok(Some(HashFile::parse(self.fs.read_all_lines(&path)?)));
        }
        match self.inner.download_hash_file(version)? {
            Some(hashes) => {
                self.fs.create_directory(&self.version_dir(version))?;
                self.fs.write_file(&path, &hashes.content())?;
                Ok(Some(hashes))
            }
            None => Ok(None),
        }
    }
}
