//! Error taxonomy for the bootstrapper.
//!
//! Strategies return `anyhow::Result` with a typed [`BootstrapError`] at
//! the root of the chain wherever the failure class matters downstream.
//! The one classification that drives control flow is "network-class":
//! those errors — and only those — trigger fallback delegation in the
//! strategy chain. Everything else propagates to the composition root.

use thiserror::Error;

/// All failure cases the bootstrapper distinguishes by type.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Transient network failure: transport errors and non-success HTTP
    /// statuses alike. The only error class that activates a fallback
    /// strategy.
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// A cached hash file exists but is missing the entry it must contain.
    /// This means the hash file format itself is broken, so it is a hard
    /// error; the corrupt file is deleted before this is raised.
    #[error("cached hash file {path} is corrupt: no entry for {entry}")]
    CacheCorruption { path: String, entry: String },

    /// A downloaded file failed SHA-256 verification after the retry.
    #[error("hash mismatch for {file}: expected {expected}, got {actual}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// A version string could not be parsed.
    #[error("invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    /// A source produced no usable version candidates.
    #[error("no versions found at {source_url}")]
    NoVersionFound { source_url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// True when the error chain bottoms out in a network-class failure.
///
/// Context added via `anyhow` can bury the typed error, so the whole chain
/// is scanned.
pub fn is_network_error(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<BootstrapError>(), Some(BootstrapError::Network { .. })))
}

/// True when the error chain carries a cache-corruption failure.
pub fn is_cache_corruption(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(cause.downcast_ref::<BootstrapError>(), Some(BootstrapError::CacheCorruption { .. }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn network_errors_are_classified_through_context() {
        let err: anyhow::Error = BootstrapError::Network {
            url: "https://example.test".to_string(),
            reason: "timed out".to_string(),
        }
        .into();
        let wrapped = err.context("while resolving the latest version");

        assert!(is_network_error(&wrapped));
        assert!(!is_cache_corruption(&wrapped));
    }

    #[test]
    fn other_errors_are_not_network_class() {
        let err: anyhow::Error = BootstrapError::InvalidVersion {
            input: "x".to_string(),
            reason: "nope".to_string(),
        }
        .into();
        assert!(!is_network_error(&err));
    }
}
