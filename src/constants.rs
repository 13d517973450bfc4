//! Well-known names and endpoints.
//!
//! The on-disk names (`paket.exe`, `paket-sha256.txt`, `paket.<v>.nupkg`)
//! are wire/layout formats shared with every other consumer of the
//! releases and must not change.

/// File name of the tool binary inside releases, packages, and the cache.
pub const TOOL_FILE_NAME: &str = "paket.exe";

/// Target file name used with `--as-tool` (extensionless launcher).
pub const TOOL_COMMAND_NAME: &str = "paket";

/// File name of the bootstrapper binary inside releases and packages.
pub const BOOTSTRAPPER_FILE_NAME: &str = "paket.bootstrapper.exe";

/// Per-version checksum manifest name, in releases and in the cache.
pub const HASH_FILE_NAME: &str = "paket-sha256.txt";

/// NuGet package id of the tool.
pub const NUGET_PACKAGE_ID: &str = "paket";

/// Path of the tool binary inside the `.nupkg` archive.
pub const NUPKG_TOOL_PATH: &str = "tools/paket.exe";

/// Path of the bootstrapper binary inside the `.nupkg` archive.
pub const NUPKG_BOOTSTRAPPER_PATH: &str = "tools/paket.bootstrapper.exe";

/// Releases-latest page whose `<title>` carries the stable version.
pub const GITHUB_RELEASES_LATEST_URL: &str = "https://github.com/fsprojects/Paket/releases/latest";

/// Releases index page scanned for prerelease tags.
pub const GITHUB_RELEASES_URL: &str = "https://github.com/fsprojects/Paket/releases";

/// Marker preceding a version in the releases index markup.
pub const GITHUB_TREE_MARKER: &str = "Paket/tree/";

/// Download location of a release asset: `{base}/{version}/{file}`.
pub const GITHUB_DOWNLOAD_BASE_URL: &str =
    "https://github.com/fsprojects/Paket/releases/download";

/// Default NuGet v2 feed queried when no `--nuget-source` is given.
pub const DEFAULT_NUGET_SOURCE: &str = "https://www.nuget.org/api/v2";

/// Name of the cache directory under the local application-data folder.
pub const CACHE_DIR_NAME: &str = "Paket";
