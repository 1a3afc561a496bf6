//! AST arena.
//!
//! Nodes live in one `Vec` per document and refer to each other by
//! [`AstId`]. Containment is a plain index back to the parent, and every
//! cross-reference slot lives in a second arena addressed by [`RefId`], so
//! the whole tree is serializable and free of owning cycles.
//!
//! ```text
//! Ast
//! ├── nodes: [AstNode]       properties hold Value::Node / Value::Reference
//! ├── references: [CrossRef] resolution cell written only by the linker
//! └── root: AstId
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use text_size::TextRange;

use crate::base::DocumentId;

use super::cst::CstPtr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AstId(pub u32);

impl AstId {
    /// Placeholder for a reference whose container is not allocated yet.
    pub(crate) const DETACHED: AstId = AstId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RefId(pub u32);

impl RefId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable identity of an AST node across the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub document: DocumentId,
    pub node: AstId,
}

impl NodeRef {
    pub fn new(document: DocumentId, node: AstId) -> Self {
        Self { document, node }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(SmolStr),
    Number(f64),
    Bool(bool),
    Node(AstId),
    Reference(RefId),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<AstId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<RefId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Default values are overwritten when a delegated node is merged.
    pub(crate) fn is_default(&self) -> bool {
        matches!(self, Value::List(items) if items.is_empty()) || matches!(self, Value::Bool(false))
    }
}

/// Where a node sits inside its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Containment {
    pub node: AstId,
    pub property: SmolStr,
    /// Position inside a list property.
    pub index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstNode {
    pub node_type: SmolStr,
    pub container: Option<Containment>,
    pub properties: IndexMap<SmolStr, Value>,
    /// The rule node this AST node was built from.
    pub cst: Option<CstPtr>,
    pub(crate) feature_ranges: Vec<(SmolStr, TextRange)>,
}

impl AstNode {
    pub fn new(node_type: impl Into<SmolStr>) -> Self {
        Self {
            node_type: node_type.into(),
            container: None,
            properties: IndexMap::new(),
            cst: None,
            feature_ranges: Vec::new(),
        }
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    pub fn get_str(&self, property: &str) -> Option<&str> {
        self.get(property).and_then(Value::as_str)
    }

    /// Source range of the first value assigned to `feature`.
    pub fn feature_range(&self, feature: &str) -> Option<TextRange> {
        self.feature_ranges
            .iter()
            .find(|(name, _)| name == feature)
            .map(|(_, range)| *range)
    }

    pub fn range(&self) -> Option<TextRange> {
        self.cst.map(|ptr| ptr.range())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Unresolved,
    Resolved(NodeRef),
    /// Linking ran and found no candidate; holds the diagnostic message.
    Failed(String),
}

/// A cross-reference slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRef {
    /// Reference text after value conversion.
    pub text: SmolStr,
    /// Node owning the reference.
    pub container: AstId,
    pub property: SmolStr,
    pub target_type: SmolStr,
    pub range: TextRange,
    pub resolution: Resolution,
}

impl CrossRef {
    pub fn target(&self) -> Option<NodeRef> {
        match &self.resolution {
            Resolution::Resolved(target) => Some(*target),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.resolution, Resolution::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<AstNode>,
    references: Vec<CrossRef>,
    root: AstId,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            references: Vec::new(),
            root: AstId(0),
        }
    }

    pub fn root(&self) -> AstId {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: AstId) {
        self.root = root;
    }

    pub fn node(&self, id: AstId) -> &AstNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: AstId) -> &mut AstNode {
        &mut self.nodes[id.index()]
    }

    pub fn get(&self, id: AstId) -> Option<&AstNode> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn alloc_node(&mut self, node: AstNode) -> AstId {
        let id = AstId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn reference(&self, id: RefId) -> &CrossRef {
        &self.references[id.index()]
    }

    pub(crate) fn reference_mut(&mut self, id: RefId) -> &mut CrossRef {
        &mut self.references[id.index()]
    }

    /// All cross-references, in document order.
    pub fn references(&self) -> impl Iterator<Item = (RefId, &CrossRef)> {
        self.references
            .iter()
            .enumerate()
            .map(|(index, r)| (RefId(index as u32), r))
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub(crate) fn alloc_reference(&mut self, reference: CrossRef) -> RefId {
        let id = RefId(self.references.len() as u32);
        self.references.push(reference);
        id
    }

    /// Child nodes in property order.
    pub fn children(&self, id: AstId) -> Vec<AstId> {
        let mut out = Vec::new();
        for value in self.node(id).properties.values() {
            collect_nodes(value, &mut out);
        }
        out
    }

    /// `id` and everything below it, in document order.
    pub fn descendants(&self, id: AstId) -> Vec<AstId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            let children = self.children(next);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Containers of `id`, innermost first, excluding `id` itself.
    pub fn ancestors(&self, id: AstId) -> impl Iterator<Item = AstId> + '_ {
        std::iter::successors(self.container_of(id), |current| self.container_of(*current))
    }

    pub fn container_of(&self, id: AstId) -> Option<AstId> {
        self.get(id)?.container.as_ref().map(|c| c.node)
    }

    /// Resets every resolution cell to `Unresolved`.
    pub(crate) fn reset_references(&mut self) {
        for reference in &mut self.references {
            reference.resolution = Resolution::Unresolved;
        }
    }
}

fn collect_nodes(value: &Value, out: &mut Vec<AstId>) {
    match value {
        Value::Node(id) => out.push(*id),
        Value::List(items) => {
            for item in items {
                collect_nodes(item, out);
            }
        }
        _ => {}
    }
}
