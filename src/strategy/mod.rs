//! Pluggable download strategies and their combinators.
//!
//! A [`DownloadStrategy`] is a source that can resolve the latest tool
//! version, download a given version, update the bootstrapper itself, and
//! (optionally) supply a checksum manifest. Concrete sources live in
//! [`github`] and [`nuget`]; [`cache`] and [`throttle`] are decorators
//! that wrap one *effective* strategy and delegate every call to it.
//!
//! Composition is an immutable tree built once by the composition root:
//!
//! - [`WithFallback`] pairs a primary with a fallback that takes over a
//!   call only when the primary fails with a network-class error.
//! - [`Traced`] wraps any strategy with per-call elapsed-time logging; it
//!   logs and rethrows failures unchanged.
//!
//! There is no retry at this layer and no runtime rewiring of the chain.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::is_network_error;
use crate::verification::HashFile;

pub mod cache;
pub mod github;
pub mod nuget;
pub mod throttle;

/// A source for resolving and downloading a versioned tool binary.
pub trait DownloadStrategy: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Whether [`DownloadStrategy::download_hash_file`] can ever return a
    /// manifest. Callers treat `false` (and a `None` result) as "skip
    /// verification", never as failure.
    fn can_download_hash_file(&self) -> bool {
        false
    }

    /// Whether this node already delegates to a fallback on failure.
    /// Decorators that add their own failure handling refuse to wrap such
    /// a node to keep fallback semantics unambiguous.
    fn has_fallback(&self) -> bool {
        false
    }

    /// Resolve the latest available version string.
    fn get_latest_version(&self, ignore_prerelease: bool) -> Result<String>;

    /// Download `version` of the tool to `target`, verifying against
    /// `hash_file` when one is supplied.
    fn download_version(
        &self,
        version: &str,
        target: &Path,
        hash_file: Option<&HashFile>,
    ) -> Result<()>;

    /// Replace the running bootstrapper binary with `version`.
    fn self_update(&self, version: &str) -> Result<()>;

    /// Fetch the checksum manifest for `version`, `None` when this source
    /// cannot supply one.
    fn download_hash_file(&self, version: &str) -> Result<Option<HashFile>>;
}

/// Primary/fallback pair: every call goes to the primary; the fallback is
/// consulted only when the primary fails with a network-class error. Any
/// other failure propagates untouched.
pub struct WithFallback {
    primary: Box<dyn DownloadStrategy>,
    fallback: Box<dyn DownloadStrategy>,
    name: String,
}

impl WithFallback {
    pub fn new(primary: Box<dyn DownloadStrategy>, fallback: Box<dyn DownloadStrategy>) -> WithFallback {
        let name = format!("{} (fallback: {})", primary.name(), fallback.name());
        WithFallback {
            primary,
            fallback,
            name,
        }
    }

    fn delegate<T>(
        &self,
        operation: &str,
        primary: impl FnOnce(&dyn DownloadStrategy) -> Result<T>,
        fallback: impl FnOnce(&dyn DownloadStrategy) -> Result<T>,
    ) -> Result<T> {
        match primary(self.primary.as_ref()) {
            Ok(value) => Ok(value),
            Err(err) if is_network_error(&err) => {
                warn!(
                    "{} failed on {} ({}), falling back to {}",
                    operation,
                    self.primary.name(),
                    err,
                    self.fallback.name()
                );
                fallback(self.fallback.as_ref())
            }
            Err(err) => Err(err),
        }
    }
}

impl DownloadStrategy for WithFallback {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_download_hash_file(&self) -> bool {
        self.primary.can_download_hash_file()
    }

    fn has_fallback(&self) -> bool {
        true
    }

    fn get_latest_version(&self, ignore_prerelease: bool) -> Result<String> {
        self.delegate(
            "GetLatestVersion",
            |s| s.get_latest_version(ignore_prerelease),
            |s| s.get_latest_version(ignore_prerelease),
        )
    }

    fn download_version(
        &self,
        version: &str,
        target: &Path,
        hash_file: Option<&HashFile>,
    ) -> Result<()> {
        self.delegate(
            "DownloadVersion",
            |s| s.download_version(version, target, hash_file),
            |s| s.download_version(version, target, hash_file),
        )
    }

    fn self_update(&self, version: &str) -> Result<()> {
        self.delegate(
            "SelfUpdate",
            |s| s.self_update(version),
            |s| s.self_update(version),
        )
    }

    fn download_hash_file(&self, version: &str) -> Result<Option<HashFile>> {
        self.delegate(
            "DownloadHashFile",
            |s| s.download_hash_file(version),
            |s| s.download_hash_file(version),
        )
    }
}

/// Swap the running binary for `replacement`, restoring the original on
/// any failure.
///
/// The current binary is moved aside to `<name>.backup` first; a running
/// executable cannot be deleted on Windows, so the backup stays behind
/// after a successful swap.
pub(crate) fn replace_binary(
    fs: &dyn crate::proxy::FileSystemProxy,
    current: &Path,
    replacement: &Path,
) -> Result<()> {
    let backup = current.with_file_name(format!(
        "{}.backup",
        current.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    ));

    if fs.file_exists(&backup) {
        fs.delete_file(&backup)?;
    }
    fs.move_file(current, &backup)?;

    match fs.move_file(replacement, current) {
        Ok(()) => {
            debug!("previous binary kept at {}", backup.display());
            Ok(())
        }
        Err(err) => {
            warn!("binary swap failed, restoring {}", current.display());
            if let Err(restore_err) = fs.move_file(&backup, current) {
                warn!("could not restore previous binary: {restore_err}");
            }
            Err(err)
        }
    }
}

/// Transparent timing wrapper: logs how long each call took, logs and
/// rethrows failures without altering them. Applied by the composition
/// root when verbose output is requested so the strategies themselves stay
/// free of cross-cutting concerns.
pub struct Traced {
    inner: Box<dyn DownloadStrategy>,
}

impl Traced {
    pub fn new(inner: Box<dyn DownloadStrategy>) -> Traced {
        Traced { inner }
    }

    fn timed<T>(&self, operation: &str, call: impl FnOnce() -> Result<T>) -> Result<T> {
        let started = std::time::Instant::now();
        let result = call();
        let elapsed = started.elapsed();
        match &result {
            Ok(_) => debug!("{} on {} took {:?}", operation, self.inner.name(), elapsed),
            Err(err) => debug!(
                "{} on {} failed after {:?}: {}",
                operation,
                self.inner.name(),
                elapsed,
                err
            ),
        }
        result
    }
}

impl DownloadStrategy for Traced {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn can_download_hash_file(&self) -> bool {
        self.inner.can_download_hash_file()
    }

    fn has_fallback(&self) -> bool {
        self.inner.has_fallback()
    }

    fn get_latest_version(&self, ignore_prerelease: bool) -> Result<String> {
        self.timed("GetLatestVersion", || self.inner.get_latest_version(ignore_prerelease))
    }

    fn download_version(
        &self,
        version: &str,
        target: &Path,
        hash_file: Option<&HashFile>,
    ) -> Result<()> {
        self.timed("DownloadVersion", || {
            self.inner.download_version(version, target, hash_file)
        })
    }

    fn self_update(&self, version: &str) -> Result<()> {
        self.timed("SelfUpdate", || self.inner.self_update(version))
    }

    fn download_hash_file(&self, version: &str) -> Result<Option<HashFile>> {
        self.timed("DownloadHashFile", || self.inner.download_hash_file(version))
    }
}
