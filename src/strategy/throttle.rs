//! Time-based throttle over an effective strategy.
//!
//! Rate-limits network version checks: while the target file's last write
//! is younger than the configured age, the locally installed version is
//! reported without touching the network at all. When a check does run
//! and resolves to the version already installed, the target's timestamp
//! is refreshed so the quiet window starts over without a download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::proxy::FileSystemProxy;
use crate::strategy::DownloadStrategy;
use crate::verification::HashFile;

pub struct TemporarilyIgnoreUpdatesStrategy {
    inner: Box<dyn DownloadStrategy>,
    fs: Arc<dyn FileSystemProxy>,
    target: PathBuf,
    max_file_age_minutes: i64,
    name: String,
}

impl TemporarilyIgnoreUpdatesStrategy {
    pub fn new(
        inner: Box<dyn DownloadStrategy>,
        fs: Arc<dyn FileSystemProxy>,
        target: PathBuf,
        max_file_age_minutes: i64,
    ) -> TemporarilyIgnoreUpdatesStrategy {
        let name = format!("{} (throttled)", inner.name());
        TemporarilyIgnoreUpdatesStrategy {
            inner,
            fs,
            target,
            max_file_age_minutes,
            name,
        }
    }

    /// Whether the target is due for a fresh version check. A
    /// non-positive age disables the throttle; a missing target has no
    /// version worth trusting.
    fn target_is_stale(&self) -> bool {
        if self.max_file_age_minutes <= 0 {
            return true;
        }
        match self.fs.last_write_time(&self.target) {
            Ok(written) => Utc::now() > written + Duration::minutes(self.max_file_age_minutes),
            Err(_) => true,
        }
    }

    fn touch_target(&self) {
        // A failed touch only shortens the quiet window; never an error.
        if let Err(err) = self.fs.touch(&self.target) {
            warn!("could not refresh timestamp of {}: {err}", self.target.display());
        }
    }
}

impl DownloadStrategy for TemporarilyIgnoreUpdatesStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_download_hash_file(&self) -> bool {
        self.inner.can_download_hash_file()
    }

    fn has_fallback(&self) -> bool {
        self.inner.has_fallback()
    }

    fn get_latest_version(&self, ignore_prerelease: bool) -> Result<String> {
        if self.target_is_stale() {
            let latest = self.inner.get_latest_version(ignore_prerelease)?;
            if latest == self.fs.local_file_version(&self.target) {
                self.touch_target();
            }
            Ok(latest)
        } else {
            debug!(
                "{} was written less than {} minutes ago, skipping version check",
                self.target.display(),
                self.max_file_age_minutes
            );
            Ok(self.fs.local_file_version(&self.target))
        }
    }

    fn download_version(
        &self,
        version: &str,
        target: &Path,
        hash_file: Option<&HashFile>,
    ) -> Result<()> {
        self.inner.download_version(version, target, hash_file)?;
        self.touch_target();
        Ok(())
    }

    fn self_update(&self, version: &str) -> Result<()> {
        self.inner.self_update(version)
    }

    fn download_hash_file(&self, version: &str) -> Result<Option<HashFile>> {
        self.inner.download_hash_file(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryFileSystem, RecordingStrategy};

    fn target() -> PathBuf {
        PathBuf::from("/install/paket.exe")
    }

    fn throttled(
        fs: Arc<InMemoryFileSystem>,
        inner: RecordingStrategy,
        minutes: i64,
    ) -> TemporarilyIgnoreUpdatesStrategy {
        TemporarilyIgnoreUpdatesStrategy::new(Box::new(inner), fs, target(), minutes)
    }

    #[test]
    fn fresh_target_skips_the_network_entirely() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.add_file(&target(), b"tool".to_vec());
        fs.set_local_version(&target(), "1.0.0");
        fs.set_last_write_time(&target(), Utc::now() - Duration::minutes(9));
        let inner = RecordingStrategy::new("GitHub", fs.clone()).with_latest("1.1.0");
        let checks = inner.latest_counter();
        let strategy = throttled(fs, inner, 10);

        assert_eq!(strategy.get_latest_version(true).unwrap(), "1.0.0");
        assert_eq!(*checks.lock().unwrap(), 0);
    }

    #[test]
    fn stale_target_delegates_to_the_effective_strategy() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.add_file(&target(), b"tool".to_vec());
        fs.set_local_version(&target(), "1.0.0");
        fs.set_last_write_time(&target(), Utc::now() - Duration::minutes(11));
        let inner = RecordingStrategy::new("GitHub", fs.clone()).with_latest("1.1.0");
        let checks = inner.latest_counter();
        let strategy = throttled(fs, inner, 10);

        assert_eq!(strategy.get_latest_version(true).unwrap(), "1.1.0");
        assert_eq!(*checks.lock().unwrap(), 1);
    }

    #[test]
    fn matching_version_resets_the_quiet_window() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.add_file(&target(), b"tool".to_vec());
        fs.set_local_version(&target(), "1.0.0");
        let old = Utc::now() - Duration::minutes(30);
        fs.set_last_write_time(&target(), old);
        let inner = RecordingStrategy::new("GitHub", fs.clone()).with_latest("1.0.0");
        let strategy = throttled(fs.clone(), inner, 10);

        assert_eq!(strategy.get_latest_version(true).unwrap(), "1.0.0");
        assert!(fs.last_write_time_of(&target()).unwrap() > old);
    }

    #[test]
    fn newer_version_does_not_touch_the_target() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.add_file(&target(), b"tool".to_vec());
        fs.set_local_version(&target(), "1.0.0");
        let old = Utc::now() - Duration::minutes(30);
        fs.set_last_write_time(&target(), old);
        let inner = RecordingStrategy::new("GitHub", fs.clone()).with_latest("1.1.0");
        let strategy = throttled(fs.clone(), inner, 10);

        strategy.get_latest_version(true).unwrap();
        assert_eq!(fs.last_write_time_of(&target()).unwrap(), old);
    }

    #[test]
    fn non_positive_age_disables_the_throttle() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.add_file(&target(), b"tool".to_vec());
        fs.set_local_version(&target(), "1.0.0");
        fs.set_last_write_time(&target(), Utc::now());
        let inner = RecordingStrategy::new("GitHub", fs.clone()).with_latest("1.1.0");
        let checks = inner.latest_counter();
        let strategy = throttled(fs, inner, 0);

        assert_eq!(strategy.get_latest_version(true).unwrap(), "1.1.0");
        assert_eq!(*checks.lock().unwrap(), 1);
    }

    #[test]
    fn missing_target_is_stale_not_an_error() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let inner = RecordingStrategy::new("GitHub", fs.clone()).with_latest("1.1.0");
        let strategy = throttled(fs, inner, 10);

        assert_eq!(strategy.get_latest_version(true).unwrap(), "1.1.0");
    }

    #[test]
    fn download_touches_the_target_on_success() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.add_file(&target(), b"tool".to_vec());
        let old = Utc::now() - Duration::minutes(30);
        fs.set_last_write_time(&target(), old);
        let inner = RecordingStrategy::new("GitHub", fs.clone()).with_payload(b"new-tool");
        let strategy = throttled(fs.clone(), inner, 10);

        strategy.download_version("1.1.0", &target(), None).unwrap();
        assert!(fs.last_write_time_of(&target()).unwrap() > old);
    }
}
