//! Names of AST nodes.

use smol_str::SmolStr;
use text_size::TextRange;

use crate::syntax::AstNode;

/// Decides which nodes are nameable and what they are called.
pub trait NameProvider: Send + Sync {
    fn name<'a>(&self, node: &'a AstNode) -> Option<&'a str>;

    /// Range of the name in the source, if known.
    fn name_range(&self, node: &AstNode) -> Option<TextRange>;
}

/// Reads the `name` property.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNameProvider;

impl NameProvider for DefaultNameProvider {
    fn name<'a>(&self, node: &'a AstNode) -> Option<&'a str> {
        node.get_str("name").filter(|name| !name.is_empty())
    }

    fn name_range(&self, node: &AstNode) -> Option<TextRange> {
        node.feature_range("name").or_else(|| node.range())
    }
}

/// Reads a configurable property instead of `name`.
#[derive(Debug, Clone)]
pub struct PropertyNameProvider {
    property: SmolStr,
}

impl PropertyNameProvider {
    pub fn new(property: impl Into<SmolStr>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

impl NameProvider for PropertyNameProvider {
    fn name<'a>(&self, node: &'a AstNode) -> Option<&'a str> {
        node.get_str(&self.property).filter(|name| !name.is_empty())
    }

    fn name_range(&self, node: &AstNode) -> Option<TextRange> {
        node.feature_range(&self.property).or_else(|| node.range())
    }
}
