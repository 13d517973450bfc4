//! End-to-end runs through the composed strategy chain, over in-memory
//! filesystem and network collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use paket_bootstrap::config::DownloadArguments;
use paket_bootstrap::constants::{
    DEFAULT_NUGET_SOURCE, GITHUB_DOWNLOAD_BASE_URL, GITHUB_RELEASES_LATEST_URL, HASH_FILE_NAME,
    TOOL_FILE_NAME,
};
use paket_bootstrap::core::is_network_error;
use paket_bootstrap::test_utils::{InMemoryFileSystem, InMemoryWebRequest, sha256_hex};
use paket_bootstrap::workflow::{ChainSettings, compose_chain, run};

fn arguments() -> DownloadArguments {
    DownloadArguments {
        folder: PathBuf::from("/install"),
        target: PathBuf::from("/install/paket.exe"),
        ..DownloadArguments::default()
    }
}

fn settings() -> ChainSettings {
    ChainSettings {
        prefer_nuget: false,
        force_nuget: false,
        verbose: false,
        cache_dir: PathBuf::from("/cache"),
    }
}

fn asset_url(version: &str, file: &str) -> String {
    format!("{GITHUB_DOWNLOAD_BASE_URL}/{version}/{file}")
}

fn stub_github_release(web: &InMemoryWebRequest, version: &str, tool: &[u8]) {
    web.stub_string(
        GITHUB_RELEASES_LATEST_URL,
        &format!("<title>Release {version} · fsprojects/Paket</title>"),
    );
    web.stub_file(&asset_url(version, TOOL_FILE_NAME), tool.to_vec());
    web.stub_file(
        &asset_url(version, HASH_FILE_NAME),
        format!("{} {TOOL_FILE_NAME}\n", sha256_hex(tool)).into_bytes(),
    );
}

/// A first run resolves the latest stable release from GitHub, installs
/// the verified binary, and leaves a copy in the cache.
#[test]
fn test_first_run_installs_and_caches_latest_stable() -> Result<()> {
    let fs = Arc::new(InMemoryFileSystem::new());
    let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
    stub_github_release(&web, "5.0.0", b"tool-bytes");
    let args = arguments();
    let chain = compose_chain(fs.clone(), web.clone(), &args, &settings())?;

    run(chain.as_ref(), fs.as_ref(), &args)?;

    assert_eq!(fs.file_content(&args.target).unwrap(), b"tool-bytes");
    assert_eq!(
        fs.file_content(Path::new("/cache/5.0.0/paket.exe")).unwrap(),
        b"tool-bytes"
    );
    assert!(fs.file_content(Path::new("/cache/5.0.0/paket-sha256.txt")).is_some());
    Ok(())
}

/// Once the installed tool reports the resolved version, a rerun checks
/// the version online but downloads nothing.
#[test]
fn test_up_to_date_rerun_downloads_nothing() -> Result<()> {
    let fs = Arc::new(InMemoryFileSystem::new());
    let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
    stub_github_release(&web, "5.0.0", b"tool-bytes");
    let args = arguments();
    let chain = compose_chain(fs.clone(), web.clone(), &args, &settings())?;

    run(chain.as_ref(), fs.as_ref(), &args)?;
    fs.set_local_version(&args.target, "5.0.0");
    run(chain.as_ref(), fs.as_ref(), &args)?;

    assert_eq!(web.file_request_count(&asset_url("5.0.0", TOOL_FILE_NAME)), 1);
    Ok(())
}

/// A pinned version never consults the release pages.
#[test]
fn test_pinned_version_skips_online_resolution() -> Result<()> {
    let fs = Arc::new(InMemoryFileSystem::new());
    let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
    stub_github_release(&web, "4.8.0", b"pinned-tool");
    let args = DownloadArguments {
        latest_version: "4.8.0".to_string(),
        ..arguments()
    };
    let chain = compose_chain(fs.clone(), web.clone(), &args, &settings())?;

    run(chain.as_ref(), fs.as_ref(), &args)?;

    assert_eq!(fs.file_content(&args.target).unwrap(), b"pinned-tool");
    assert!(!web.requested_urls().iter().any(|u| u == GITHUB_RELEASES_LATEST_URL));
    Ok(())
}

/// When GitHub is unreachable, the chain falls back to the NuGet feed and
/// extracts the tool from the package.
#[test]
fn test_github_outage_falls_back_to_nuget() -> Result<()> {
    let fs = Arc::new(InMemoryFileSystem::new());
    let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
    web.stub_string(
        &format!("{DEFAULT_NUGET_SOURCE}/package-versions/paket?includePrerelease=false"),
        r#"["4.5.6"]"#,
    );
    web.stub_file(
        &format!("{DEFAULT_NUGET_SOURCE}/package/paket/4.5.6"),
        b"nupkg-bytes".to_vec(),
    );
    fs.stub_archive(b"nupkg-bytes", &[("tools/paket.exe", b"nuget-tool")]);
    let args = arguments();
    let chain = compose_chain(fs.clone(), web.clone(), &args, &settings())?;

    run(chain.as_ref(), fs.as_ref(), &args)?;

    assert_eq!(fs.file_content(&args.target).unwrap(), b"nuget-tool");
    assert_eq!(
        fs.file_content(Path::new("/cache/4.5.6/paket.exe")).unwrap(),
        b"nuget-tool"
    );
    Ok(())
}

/// With every source down, the last-resort cache scan installs the best
/// version already on disk.
#[test]
fn test_total_outage_installs_from_cache() -> Result<()> {
    let fs = Arc::new(InMemoryFileSystem::new());
    let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
    fs.add_file(Path::new("/cache/2.0.0/paket.exe"), b"cached-tool".to_vec());
    let args = arguments();
    let chain = compose_chain(fs.clone(), web.clone(), &args, &settings())?;

    run(chain.as_ref(), fs.as_ref(), &args)?;

    assert_eq!(fs.file_content(&args.target).unwrap(), b"cached-tool");
    Ok(())
}

/// With every source down and an empty cache, the original network error
/// surfaces.
#[test]
fn test_total_outage_with_empty_cache_fails() -> Result<()> {
    let fs = Arc::new(InMemoryFileSystem::new());
    let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
    let args = arguments();
    let chain = compose_chain(fs.clone(), web.clone(), &args, &settings())?;

    let err = run(chain.as_ref(), fs.as_ref(), &args).unwrap_err();
    assert!(is_network_error(&err));
    assert!(fs.file_content(&args.target).is_none());
    Ok(())
}

/// A fresh enough target suppresses the version check entirely: the run
/// completes without a single request.
#[test]
fn test_throttled_run_is_fully_offline() -> Result<()> {
    let fs = Arc::new(InMemoryFileSystem::new());
    let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
    let args = DownloadArguments {
        max_file_age_in_minutes: Some(720),
        ..arguments()
    };
    fs.add_file(&args.target, b"tool".to_vec());
    fs.set_local_version(&args.target, "1.0.0");
    let chain = compose_chain(fs.clone(), web.clone(), &args, &settings())?;

    run(chain.as_ref(), fs.as_ref(), &args)?;

    assert!(web.requested_urls().is_empty());
    Ok(())
}

/// `--force-nuget` never touches GitHub, even when NuGet fails.
#[test]
fn test_force_nuget_does_not_fall_back_to_github() -> Result<()> {
    let fs = Arc::new(InMemoryFileSystem::new());
    let web = Arc::new(InMemoryWebRequest::new(fs.clone()));
    stub_github_release(&web, "5.0.0", b"tool-bytes");
    let args = arguments();
    let settings = ChainSettings {
        force_nuget: true,
        ..settings()
    };
    let chain = compose_chain(fs.clone(), web.clone(), &args, &settings)?;

    let err = run(chain.as_ref(), fs.as_ref(), &args).unwrap_err();
    assert!(is_network_error(&err));
    assert!(!web.requested_urls().iter().any(|u| u == GITHUB_RELEASES_LATEST_URL));
    Ok(())
}
