//! Opens every matching file under a directory into a workspace.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::base::DocumentId;
use crate::workspace::Workspace;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "out"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("directory not found: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Loads workspace files from disk.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceLoader {
    follow_links: bool,
}

impl WorkspaceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Paths of every file the workspace's language accepts, sorted.
    pub fn collect_paths(
        &self,
        root: &Path,
        workspace: &Workspace,
    ) -> Result<Vec<PathBuf>, LoadError> {
        if !root.is_dir() {
            return Err(LoadError::NotADirectory(root.to_path_buf()));
        }
        let config = workspace.language().config();
        let mut paths = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));
        for entry in walker {
            let entry = entry.map_err(|source| LoadError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
            if entry.file_type().is_file() && config.accepts(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Opens every accepted file under `root`. Unreadable files are skipped
    /// with a warning. Returns the ids of the opened documents.
    pub fn load_directory(
        &self,
        root: impl AsRef<Path>,
        workspace: &mut Workspace,
    ) -> Result<Vec<DocumentId>, LoadError> {
        let root = root.as_ref();
        let paths = self.collect_paths(root, workspace)?;
        let mut opened = Vec::with_capacity(paths.len());
        for path in paths {
            match std::fs::read_to_string(&path) {
                Ok(text) => opened.push(workspace.open(path_to_uri(&path), &text)),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable file")
                }
            }
        }
        tracing::debug!(root = %root.display(), documents = opened.len(), "directory loaded");
        Ok(opened)
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// `file://` URI for a path, made absolute against the current directory.
pub fn path_to_uri(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let text = absolute.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{text}")
    } else {
        format!("file:///{text}")
    }
}
