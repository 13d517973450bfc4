//! Core types shared across the bootstrapper: the error taxonomy and the
//! classification helpers the strategy chain keys its fallback decisions on.

pub mod error;

pub use error::{BootstrapError, is_cache_corruption, is_network_error};
