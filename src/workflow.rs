//! Composition root: builds the strategy chain and drives one run.
//!
//! The chain shape is decided entirely here, once, from the parsed flags:
//!
//! ```text
//! Traced( Throttle( WithFallback( Cache(GitHub), Cache(Nuget) ) ) )
//! ```
//!
//! with each layer present only when asked for. Exactly one cache node is
//! marked as the last resort, so a full network outage degrades to the
//! best version already on disk instead of failing outright.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::DownloadArguments;
use crate::proxy::{FileSystemProxy, WebRequestProxy};
use crate::strategy::cache::CacheStrategy;
use crate::strategy::github::GitHubStrategy;
use crate::strategy::nuget::NugetStrategy;
use crate::strategy::throttle::TemporarilyIgnoreUpdatesStrategy;
use crate::strategy::{DownloadStrategy, Traced, WithFallback};
use crate::version::version_satisfies;

/// Chain-shape decisions that are not per-download settings.
#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub prefer_nuget: bool,
    pub force_nuget: bool,
    pub verbose: bool,
    pub cache_dir: PathBuf,
}

/// Build the immutable strategy chain for one invocation.
pub fn compose_chain(
    fs: Arc<dyn FileSystemProxy>,
    web: Arc<dyn WebRequestProxy>,
    args: &DownloadArguments,
    settings: &ChainSettings,
) -> Result<Box<dyn DownloadStrategy>> {
    let github: Box<dyn DownloadStrategy> =
        Box::new(GitHubStrategy::new(fs.clone(), web.clone()));
    let nuget: Box<dyn DownloadStrategy> = Box::new(NugetStrategy::new(
        fs.clone(),
        web.clone(),
        args.folder.clone(),
        args.nuget_source.clone(),
    ));

    let cached = |inner: Box<dyn DownloadStrategy>, last_resort: bool| -> Result<Box<dyn DownloadStrategy>> {
        if args.ignore_cache {
            return Ok(inner);
        }
        let mut node = CacheStrategy::new(inner, fs.clone(), settings.cache_dir.clone())?;
        if last_resort {
            node = node.use_cache_as_last_resort();
        }
        Ok(Box::new(node))
    };

    let mut chain: Box<dyn DownloadStrategy> = if settings.force_nuget {
        cached(nuget, true)?
    } else if settings.prefer_nuget {
        Box::new(WithFallback::new(cached(nuget, false)?, cached(github, true)?))
    } else {
        Box::new(WithFallback::new(cached(github, false)?, cached(nuget, true)?))
    };

    if let Some(minutes) = args.max_file_age_in_minutes {
        chain = Box::new(TemporarilyIgnoreUpdatesStrategy::new(
            chain,
            fs.clone(),
            args.target.clone(),
            minutes,
        ));
    }
    if settings.verbose {
        chain = Box::new(Traced::new(chain));
    }
    Ok(chain)
}

/// Resolve the requested version and bring the target (or the
/// bootstrapper itself) up to date. At most one download happens.
pub fn run(
    strategy: &dyn DownloadStrategy,
    fs: &dyn FileSystemProxy,
    args: &DownloadArguments,
) -> Result<()> {
    let version = if args.latest_version.is_empty() {
        strategy.get_latest_version(args.ignore_prerelease)?
    } else {
        args.latest_version.clone()
    };

    if args.do_self_update {
        return strategy.self_update(&version);
    }

    let local = fs.local_file_version(&args.target);
    if !local.is_empty() && version_satisfies(&local, &version) {
        info!("paket {local} is up to date");
        return Ok(());
    }

    let hash_file = if strategy.can_download_hash_file() {
        strategy.download_hash_file(&version)?
    } else {
        None
    };
    info!("downloading paket {version} to {}", args.target.display());
    strategy.download_version(&version, &args.target, hash_file.as_ref())
}
