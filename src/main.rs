//! Bootstrapper entry point.
//!
//! Parses the command line, builds the strategy chain, and runs one
//! resolve/download (or self-update) pass. A failure is only fatal when
//! the target binary is absent afterwards: an existing, merely stale tool
//! is degraded success and keeps exit code 0.

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use paket_bootstrap::cli::Cli;
use paket_bootstrap::config::default_cache_dir;
use paket_bootstrap::proxy::{FileSystemProxy, HttpClient, LocalFileSystem};
use paket_bootstrap::workflow::{self, ChainSettings};

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    std::process::exit(bootstrap(&cli));
}

fn bootstrap(cli: &Cli) -> i32 {
    let fs: Arc<dyn FileSystemProxy> = Arc::new(LocalFileSystem);

    // Install next to the bootstrapper binary itself.
    let folder = match fs.executing_binary_path() {
        Ok(exe) => exe.parent().map(|p| p.to_path_buf()).unwrap_or_default(),
        Err(err) => {
            warn!("could not locate the running binary ({err}), installing into the current directory");
            std::path::PathBuf::from(".")
        }
    };
    let args = cli.to_arguments(folder);
    let settings = ChainSettings {
        prefer_nuget: cli.prefer_nuget(),
        force_nuget: cli.force_nuget(),
        verbose: cli.verbose,
        cache_dir: default_cache_dir(),
    };

    let result = HttpClient::new().and_then(|web| {
        let chain = workflow::compose_chain(fs.clone(), Arc::new(web), &args, &settings)?;
        workflow::run(chain.as_ref(), fs.as_ref(), &args)
    });

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            // A stale tool that is still present beats no tool at all.
            if fs.file_exists(&args.target) {
                warn!("continuing with the existing {}", args.target.display());
                0
            } else {
                1
            }
        }
    }
}
