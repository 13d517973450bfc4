//! Command-line interface for the bootstrapper.
//!
//! The surface is a single flat command: an optional version argument plus
//! flags that tune where the tool comes from and how eagerly it is
//! refreshed. Parsing maps directly onto [`DownloadArguments`]; no state
//! is read from disk.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DownloadArguments;
use crate::constants::{DEFAULT_NUGET_SOURCE, TOOL_COMMAND_NAME, TOOL_FILE_NAME};

/// Keyword accepted in place of a version to opt into prereleases.
const PRERELEASE_KEYWORD: &str = "prerelease";

/// Downloads the latest (or a pinned) paket.exe next to the bootstrapper.
#[derive(Parser, Debug)]
#[command(
    name = "paket-bootstrap",
    about = "Downloads and caches paket.exe from GitHub or NuGet",
    version
)]
pub struct Cli {
    /// Version to install, or `prerelease` to resolve the newest version
    /// including prereleases. Omitted: the newest stable version.
    ///
    /// ```bash
    /// paket-bootstrap             # latest stable
    /// paket-bootstrap 5.215.0     # exactly this version
    /// paket-bootstrap prerelease  # newest, prereleases included
    /// ```
    #[arg(id = "tool-version", value_name = "VERSION")]
    version: Option<String>,

    /// Update the bootstrapper itself instead of downloading the tool.
    #[arg(long = "self")]
    self_update: bool,

    /// Skip the download cache: always fetch from the source and do not
    /// store the result.
    #[arg(short = 'f')]
    ignore_cache: bool,

    /// NuGet feed URL or local folder of `.nupkg` files used by the NuGet
    /// strategy.
    #[arg(long, value_name = "URL_OR_DIR", default_value = DEFAULT_NUGET_SOURCE)]
    nuget_source: String,

    /// Skip the version check entirely while the installed tool is
    /// younger than this many minutes.
    #[arg(long, value_name = "MINUTES")]
    max_file_age: Option<i64>,

    /// Ask NuGet first and fall back to GitHub.
    #[arg(long)]
    prefer_nuget: bool,

    /// Use NuGet only, with no GitHub fallback.
    #[arg(long)]
    force_nuget: bool,

    /// Install as `paket` (no extension) for use on the PATH.
    #[arg(long)]
    as_tool: bool,

    /// Verbose output: per-strategy timings and debug-level logs.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn prefer_nuget(&self) -> bool {
        self.prefer_nuget
    }

    pub fn force_nuget(&self) -> bool {
        self.force_nuget
    }

    /// Resolve the parsed flags into download settings, installing into
    /// `folder`.
    pub fn to_arguments(&self, folder: PathBuf) -> DownloadArguments {
        let (latest_version, ignore_prerelease) = match self.version.as_deref() {
            Some(PRERELEASE_KEYWORD) => (String::new(), false),
            Some(version) => (version.to_string(), true),
            None => (String::new(), true),
        };
        let file_name = if self.as_tool { TOOL_COMMAND_NAME } else { TOOL_FILE_NAME };
        DownloadArguments {
            target: folder.join(file_name),
            folder,
            nuget_source: self.nuget_source.clone(),
            do_self_update: self.self_update,
            latest_version,
            ignore_prerelease,
            ignore_cache: self.ignore_cache,
            max_file_age_in_minutes: self.max_file_age,
            as_tool: self.as_tool,
        }
    }
}
