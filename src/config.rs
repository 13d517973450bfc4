//! Per-invocation download settings.
//!
//! Built once from the command line, then passed by reference through the
//! composition root. Nothing here is persisted between runs.

use std::path::PathBuf;

use crate::constants::{CACHE_DIR_NAME, DEFAULT_NUGET_SOURCE, TOOL_FILE_NAME};

/// Everything a single bootstrapper run needs to know.
#[derive(Debug, Clone)]
pub struct DownloadArguments {
    /// Directory the tool is installed into (and NuGet work folders live
    /// under).
    pub folder: PathBuf,
    /// Full path of the file being installed.
    pub target: PathBuf,
    /// NuGet feed URL or local package folder.
    pub nuget_source: String,
    /// Update the bootstrapper itself instead of the tool.
    pub do_self_update: bool,
    /// Explicit version to install; empty means "resolve the latest".
    pub latest_version: String,
    pub ignore_prerelease: bool,
    /// Skip the download cache entirely.
    pub ignore_cache: bool,
    /// Quiet window for version checks; `None` disables the throttle.
    pub max_file_age_in_minutes: Option<i64>,
    /// Install under the extensionless launcher name.
    pub as_tool: bool,
}

impl Default for DownloadArguments {
    fn default() -> DownloadArguments {
        let folder = PathBuf::from(".");
        DownloadArguments {
            target: folder.join(TOOL_FILE_NAME),
            folder,
            nuget_source: DEFAULT_NUGET_SOURCE.to_string(),
            do_self_update: false,
            latest_version: String::new(),
            ignore_prerelease: true,
            ignore_cache: false,
            max_file_age_in_minutes: None,
            as_tool: false,
        }
    }
}

/// Root of the download cache: `<local application data>/Paket`, falling
/// back to a dot-directory under home when the platform has no
/// application-data convention.
pub fn default_cache_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(format!(".{CACHE_DIR_NAME}"))))
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}
