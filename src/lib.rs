//! paket-bootstrap — resolves, downloads, caches, and verifies the
//! `paket.exe` tool binary, and can update itself in place.
//!
//! The heart of the crate is the [`strategy::DownloadStrategy`] trait and
//! the immutable chain the composition root builds from it:
//!
//! - [`strategy::github`] scrapes GitHub releases and downloads assets
//!   with SHA-256 verification.
//! - [`strategy::nuget`] pulls `.nupkg` packages from a feed or a local
//!   folder and extracts the tool from them.
//! - [`strategy::cache`] keeps verified downloads under
//!   `<app-data>/Paket/<version>/` and serves them without touching the
//!   network; as the chain's last resort it also absorbs total network
//!   outages.
//! - [`strategy::throttle`] suppresses version checks while the installed
//!   tool is fresh enough.
//!
//! Fallback between sources happens only on network-class errors (see
//! [`core::BootstrapError`]); anything else aborts the run. Version
//! ordering uses the tool's own four-part [`version::SemVer`] rather than
//! standard SemVer, because the published version numbers depend on its
//! quirks.

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod proxy;
pub mod strategy;
pub mod verification;
pub mod version;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
