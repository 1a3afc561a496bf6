//! Loading documents from disk.

mod loader;

pub use loader::{LoadError, WorkspaceLoader, path_to_uri};
