//! Network collaborator interface.
//!
//! Two operations cover everything the strategies need: fetch a page or
//! API response as text, and stream a file to disk. Both are synchronous
//! blocking calls; there is no retry at this layer — failures map to
//! [`BootstrapError::Network`] and the strategy chain decides whether a
//! fallback source takes over.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::BootstrapError;

/// HTTP operations the bootstrapper consumes.
pub trait WebRequestProxy: Send + Sync {
    fn download_string(&self, url: &str) -> Result<String>;

    fn download_file(&self, url: &str, target: &Path) -> Result<()>;
}

/// Production implementation over a blocking `reqwest` client.
pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new() -> Result<HttpClient> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("paket-bootstrap/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build the HTTP client")?;
        Ok(HttpClient { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let response = self.client.get(url).send().map_err(|e| BootstrapError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        response.error_for_status().map_err(|e| {
            BootstrapError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl WebRequestProxy for HttpClient {
    fn download_string(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        self.get(url)?.text().map_err(|e| {
            BootstrapError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn download_file(&self, url: &str, target: &Path) -> Result<()> {
        debug!("GET {} -> {}", url, target.display());
        let mut response = self.get(url)?;
        let mut file = std::fs::File::create(target)
            .with_context(|| format!("failed to create {}", target.display()))?;
        io::copy(&mut response, &mut file).map_err(|e| BootstrapError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}
