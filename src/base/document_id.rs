//! Document identifiers.

use serde::{Deserialize, Serialize};

/// Identifies one document for the lifetime of the workspace that created it.
///
/// Ids are never reused: closing a document and reopening the same URI
/// yields a fresh id, so stale resolutions cannot alias a new document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u32);

impl DocumentId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}
