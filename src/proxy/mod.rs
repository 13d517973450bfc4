//! Collaborator interfaces the strategy chain is written against: the
//! filesystem and the network. Each has one production implementation and
//! in-memory test doubles in `test_utils`.

pub mod fs;
pub mod net;

pub use fs::{FileSystemProxy, LocalFileSystem};
pub use net::{HttpClient, WebRequestProxy};
