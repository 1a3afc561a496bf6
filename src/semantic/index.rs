//! Workspace-wide index of exported symbols and resolved references.
//!
//! The index phase writes one export list per document; the link phase of
//! other documents only reads them. Export lists are stored behind `Arc`
//! so a published list is never mutated in place: re-indexing a document
//! replaces its list wholesale.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use text_size::TextRange;

use crate::base::{DocumentId, LineIndex, Span};
use crate::syntax::{Ast, AstId, NodeRef, RefId};

use super::names::NameProvider;

/// Which named nodes a document exports to other documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportPolicy {
    /// Every named node anywhere in the document.
    #[default]
    AllNamed,
    /// Named direct children of the root node only.
    TopLevel,
}

/// A named node visible to other documents (or to the local scope chain).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDescription {
    pub name: SmolStr,
    pub node_type: SmolStr,
    pub target: NodeRef,
    /// Range of the name, falling back to the node range.
    pub name_range: TextRange,
    pub span: Span,
}

impl SymbolDescription {
    /// Describes `node` if the name provider gives it a name.
    pub fn describe(
        document: DocumentId,
        ast: &Ast,
        node: AstId,
        names: &dyn NameProvider,
        lines: &LineIndex,
    ) -> Option<Self> {
        let ast_node = ast.node(node);
        let name = names.name(ast_node)?;
        let name_range = names.name_range(ast_node).unwrap_or_default();
        Some(Self {
            name: SmolStr::new(name),
            node_type: ast_node.node_type.clone(),
            target: NodeRef::new(document, node),
            name_range,
            span: lines.span(name_range),
        })
    }
}

/// A resolved cross-reference, recorded after linking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDescription {
    /// The node owning the reference.
    pub source: NodeRef,
    pub reference: RefId,
    pub property: SmolStr,
    pub range: TextRange,
    pub span: Span,
    pub target: NodeRef,
}

/// Computes the exports of one document. Pure, so safe to run in parallel.
pub fn compute_exports(
    document: DocumentId,
    ast: &Ast,
    names: &dyn NameProvider,
    policy: ExportPolicy,
    lines: &LineIndex,
) -> Vec<SymbolDescription> {
    if ast.is_empty() {
        return Vec::new();
    }
    let root = ast.root();
    let candidates = match policy {
        ExportPolicy::AllNamed => ast.descendants(root),
        ExportPolicy::TopLevel => ast.children(root),
    };
    candidates
        .into_iter()
        .filter(|&node| node != root)
        .filter_map(|node| SymbolDescription::describe(document, ast, node, names, lines))
        .collect()
}

/// Describes every resolved reference of a linked document.
pub fn describe_references(
    document: DocumentId,
    ast: &Ast,
    lines: &LineIndex,
) -> Vec<ReferenceDescription> {
    ast.references()
        .filter_map(|(id, reference)| {
            let target = reference.target()?;
            Some(ReferenceDescription {
                source: NodeRef::new(document, reference.container),
                reference: id,
                property: reference.property.clone(),
                range: reference.range,
                span: lines.span(reference.range),
                target,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    /// Document insertion order is the global scope order.
    exports: IndexMap<DocumentId, Arc<[SymbolDescription]>>,
    references: IndexMap<DocumentId, Vec<ReferenceDescription>>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the exports of `document`, replacing any previous list.
    pub fn set_exports(&mut self, document: DocumentId, symbols: Vec<SymbolDescription>) {
        self.exports.insert(document, symbols.into());
    }

    pub fn exports(&self, document: DocumentId) -> &[SymbolDescription] {
        self.exports.get(&document).map(|s| &s[..]).unwrap_or_default()
    }

    pub fn has_exports(&self, document: DocumentId) -> bool {
        self.exports.contains_key(&document)
    }

    /// Every published export list, in document order.
    pub fn all_exports(&self) -> impl Iterator<Item = (DocumentId, &[SymbolDescription])> {
        self.exports.iter().map(|(id, symbols)| (*id, &symbols[..]))
    }

    pub fn set_references(&mut self, document: DocumentId, references: Vec<ReferenceDescription>) {
        self.references.insert(document, references);
    }

    pub fn references(&self, document: DocumentId) -> &[ReferenceDescription] {
        self.references
            .get(&document)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn remove_exports(&mut self, document: DocumentId) {
        self.exports.shift_remove(&document);
    }

    pub fn remove_references(&mut self, document: DocumentId) {
        self.references.shift_remove(&document);
    }

    /// Forgets everything about `document`.
    pub fn remove(&mut self, document: DocumentId) {
        self.remove_exports(document);
        self.remove_references(document);
    }

    /// All resolved references pointing at `target`, in document order.
    pub fn find_references(&self, target: NodeRef) -> Vec<&ReferenceDescription> {
        self.references
            .values()
            .flatten()
            .filter(|reference| reference.target == target)
            .collect()
    }

    /// Whether any resolved reference of `document` points into `changed`.
    pub fn is_affected(&self, document: DocumentId, changed: &FxHashSet<DocumentId>) -> bool {
        self.references(document)
            .iter()
            .any(|reference| changed.contains(&reference.target.document))
    }

    /// Documents holding a resolved reference into `changed`.
    pub fn referencing_documents(&self, changed: &FxHashSet<DocumentId>) -> Vec<DocumentId> {
        self.references
            .keys()
            .copied()
            .filter(|&document| !changed.contains(&document) && self.is_affected(document, changed))
            .collect()
    }

    pub fn document_count(&self) -> usize {
        self.exports.len()
    }
}
