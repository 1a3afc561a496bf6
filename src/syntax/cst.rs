//! Pointers from AST nodes into the CST.
//!
//! The green tree is shared and immutable, so an AST node stores the kind
//! and range of the rule node it came from rather than a live handle.

use rowan::NodeOrToken;
use serde::{Deserialize, Serialize};
use text_size::TextRange;

use crate::parser::{SyntaxKind, SyntaxNode, SyntaxToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CstPtr {
    kind: u16,
    range: TextRange,
}

impl CstPtr {
    pub fn new(kind: SyntaxKind, range: TextRange) -> Self {
        Self {
            kind: kind.to_raw(),
            range,
        }
    }

    pub fn kind(&self) -> SyntaxKind {
        SyntaxKind::from_raw(self.kind)
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    /// Finds the pointed-to node below `root`.
    pub fn to_node(&self, root: &SyntaxNode) -> Option<SyntaxNode> {
        if !root.text_range().contains_range(self.range) {
            return None;
        }
        let start = match root.covering_element(self.range) {
            NodeOrToken::Node(node) => node,
            NodeOrToken::Token(token) => token.parent()?,
        };
        let kind = self.kind();
        start
            .ancestors()
            .find(|node| node.kind() == kind && node.text_range() == self.range)
    }
}

/// Every token of the tree in source order, hidden tokens included.
pub fn leaves(root: &SyntaxNode) -> impl Iterator<Item = SyntaxToken> {
    root.descendants_with_tokens()
        .filter_map(|element| element.into_token())
}
