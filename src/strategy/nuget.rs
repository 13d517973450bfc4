//! NuGet download strategy.
//!
//! The configured source is either a local folder of `.nupkg` files or a
//! NuGet v2 feed; the mode is chosen by whether the source resolves to an
//! existing directory. Both modes reduce to the same SemVer max-selection.
//! This source never supplies a checksum manifest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::constants::{NUGET_PACKAGE_ID, NUPKG_BOOTSTRAPPER_PATH, NUPKG_TOOL_PATH};
use crate::core::BootstrapError;
use crate::proxy::{FileSystemProxy, WebRequestProxy};
use crate::strategy::{DownloadStrategy, replace_binary};
use crate::verification::HashFile;
use crate::version::{max_version, version_satisfies};

pub struct NugetStrategy {
    fs: Arc<dyn FileSystemProxy>,
    web: Arc<dyn WebRequestProxy>,
    /// Workspace for package downloads and extraction.
    folder: PathBuf,
    /// Feed URL or local package folder.
    source: String,
}

impl NugetStrategy {
    pub fn new(
        fs: Arc<dyn FileSystemProxy>,
        web: Arc<dyn WebRequestProxy>,
        folder: PathBuf,
        source: String,
    ) -> NugetStrategy {
        NugetStrategy {
            fs,
            web,
            folder,
            source,
        }
    }

    fn source_directory(&self) -> Option<PathBuf> {
        let path = PathBuf::from(&self.source);
        if self.fs.directory_exists(&path) { Some(path) } else { None }
    }

    fn versions_from_directory(&self, dir: &Path, ignore_prerelease: bool) -> Result<Vec<String>> {
        let prefix = format!("{NUGET_PACKAGE_ID}.");
        let files = self.fs.enumerate_files(dir, &format!("{NUGET_PACKAGE_ID}.*.nupkg"))?;
        let mut versions = Vec::new();
        for file in files {
            let Some(name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let Some(version) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".nupkg"))
            else {
                continue;
            };
            // The feed also carries paket.core and paket.bootstrapper
            // packages; only names where a digit follows "paket." are the
            // tool itself.
            if !version.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                continue;
            }
            if ignore_prerelease && version.contains('-') {
                continue;
            }
            versions.push(version.to_string());
        }
        Ok(versions)
    }

    fn versions_from_feed(&self, ignore_prerelease: bool) -> Result<Vec<String>> {
        let url = format!(
            "{}/package-versions/{}?includePrerelease={}",
            self.source, NUGET_PACKAGE_ID, !ignore_prerelease
        );
        let body = self.web.download_string(&url)?;
        let mut versions: Vec<String> = serde_json::from_str(&body)
            .with_context(|| format!("unexpected version list from {url}"))?;
        if ignore_prerelease {
            versions.retain(|v| !v.contains('-'));
        }
        Ok(versions)
    }

    /// Fetch `paket.<version>.nupkg` into `work`, extract it, and copy
    /// `entry` (a path inside the archive) to `target`.
    fn fetch_and_extract(
        &self,
        version: &str,
        work: &Path,
        entry: &str,
        target: &Path,
    ) -> Result<()> {
        let package = format!("{NUGET_PACKAGE_ID}.{version}.nupkg");
        let local = work.join(&package);

        match self.source_directory() {
            Some(dir) => self.fs.copy_file(&dir.join(&package), &local, true)?,
            None => {
                let url = format!("{}/package/{}/{}", self.source, NUGET_PACKAGE_ID, version);
                self.web.download_file(&url, &local)?;
            }
        }

        let extracted = work.join("extracted");
        self.fs.extract_archive(&local, &extracted)?;
        self.fs.copy_file(&extracted.join(entry), target, true)
    }

    fn with_work_folder(&self, run: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
        let work = self.folder.join(format!("{NUGET_PACKAGE_ID}-{}", Uuid::new_v4()));
        self.fs.create_directory(&work)?;
        let result = run(&work);
        // Cleanup happens on success and failure alike.
        if let Err(err) = self.fs.delete_directory(&work, true) {
            warn!("could not remove work folder {}: {err}", work.display());
        }
        result
    }
}

impl DownloadStrategy for NugetStrategy {
    fn name(&self) -> &str {
        "Nuget"
    }

    fn get_latest_version(&self, ignore_prerelease: bool) -> Result<String> {
        let versions = match self.source_directory() {
            Some(dir) => self.versions_from_directory(&dir, ignore_prerelease)?,
            None => self.versions_from_feed(ignore_prerelease)?,
        };
        max_version(versions).ok_or_else(|| {
            BootstrapError::NoVersionFound {
                source_url: self.source.clone(),
            }
            .into()
        })
    }

    fn download_version(
        &self,
        version: &str,
        target: &Path,
        _hash_file: Option<&HashFile>,
    ) -> Result<()> {
        self.with_work_folder(|work| self.fetch_and_extract(version, work, NUPKG_TOOL_PATH, target))
            .with_context(|| format!("failed to download paket {version} from {}", self.source))
    }

    fn self_update(&self, version: &str) -> Result<()> {
        let exe = self.fs.executing_binary_path()?;
        let local = self.fs.local_file_version(&exe);
        if version_satisfies(&local, version) {
            info!("bootstrapper {local} is up to date");
            return Ok(());
        }

        let replacement = self.fs.temp_path().join(format!("paket.bootstrapper-{}", Uuid::new_v4()));
        self.with_work_folder(|work| {
            self.fetch_and_extract(version, work, NUPKG_BOOTSTRAPPER_PATH, &replacement)
        })?;
        replace_binary(self.fs.as_ref(), &exe, &replacement)
            .with_context(|| format!("failed to self-update to {version}"))
    }

    fn download_hash_file(&self, _version: &str) -> Result<Option<HashFile>> {
        // NuGet packages carry no checksum manifest.
        Ok(None)
    }
}
