//! Scope computation.
//!
//! A reference is resolved against a chain of symbol levels, searched in
//! order with the first match winning:
//!
//! ```text
//! container ─► container's container ─► ... ─► root    (local symbols)
//!     ─► exports of declared dependencies, dependency order
//!     ─► global index, document order
//! ```

use rustc_hash::FxHashMap;

use crate::base::{DocumentId, LineIndex};
use crate::grammar::Grammar;
use crate::syntax::{Ast, AstId, CrossRef};

use super::index::{IndexManager, SymbolDescription};
use super::names::NameProvider;

/// Named nodes of one document, grouped by the node they are declared in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalSymbols {
    by_container: FxHashMap<AstId, Vec<SymbolDescription>>,
}

impl LocalSymbols {
    /// Registers every named node with its container.
    pub fn compute(
        document: DocumentId,
        ast: &Ast,
        names: &dyn NameProvider,
        lines: &LineIndex,
    ) -> Self {
        let mut by_container: FxHashMap<AstId, Vec<SymbolDescription>> = FxHashMap::default();
        if ast.is_empty() {
            return Self { by_container };
        }
        for node in ast.descendants(ast.root()) {
            let Some(container) = ast.container_of(node) else {
                continue;
            };
            if let Some(symbol) = SymbolDescription::describe(document, ast, node, names, lines) {
                by_container.entry(container).or_default().push(symbol);
            }
        }
        Self { by_container }
    }

    /// Symbols declared directly inside `container`.
    pub fn declared_in(&self, container: AstId) -> &[SymbolDescription] {
        self.by_container
            .get(&container)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_container.is_empty()
    }
}

/// Everything a scope provider may consult for one reference.
pub struct ScopeContext<'a> {
    pub document: DocumentId,
    pub ast: &'a Ast,
    pub reference: &'a CrossRef,
    pub locals: &'a LocalSymbols,
    pub index: &'a IndexManager,
    /// Declared dependencies of `document`, in dependency order.
    pub dependencies: &'a [DocumentId],
    pub grammar: &'a Grammar,
    pub case_insensitive: bool,
}

/// An ordered chain of symbol levels filtered by the reference type.
pub struct Scope<'a> {
    levels: Vec<&'a [SymbolDescription]>,
    target_type: &'a str,
    grammar: &'a Grammar,
    case_insensitive: bool,
}

impl<'a> Scope<'a> {
    pub fn new(target_type: &'a str, grammar: &'a Grammar, case_insensitive: bool) -> Self {
        Self {
            levels: Vec::new(),
            target_type,
            grammar,
            case_insensitive,
        }
    }

    /// Appends an outer level.
    pub fn push_level(&mut self, symbols: &'a [SymbolDescription]) {
        if !symbols.is_empty() {
            self.levels.push(symbols);
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn accepts(&self, symbol: &SymbolDescription) -> bool {
        self.grammar.is_subtype(&symbol.node_type, self.target_type)
    }

    fn matches(&self, symbol: &SymbolDescription, name: &str) -> bool {
        if self.case_insensitive {
            symbol.name.eq_ignore_ascii_case(name)
        } else {
            symbol.name == name
        }
    }

    /// First candidate named `name` in chain order.
    pub fn lookup(&self, name: &str) -> Option<&'a SymbolDescription> {
        self.levels
            .iter()
            .flat_map(|level| level.iter())
            .find(|symbol| self.matches(symbol, name) && self.accepts(symbol))
    }

    /// Every visible candidate, shadowed names removed.
    pub fn symbols(&self) -> Vec<&'a SymbolDescription> {
        let mut seen = rustc_hash::FxHashSet::default();
        self.levels
            .iter()
            .flat_map(|level| level.iter())
            .filter(|symbol| self.accepts(symbol))
            .filter(|symbol| {
                let key = if self.case_insensitive {
                    symbol.name.to_ascii_lowercase()
                } else {
                    symbol.name.to_string()
                };
                seen.insert(key)
            })
            .collect()
    }
}

/// Builds the scope for one cross-reference.
pub trait ScopeProvider: Send + Sync {
    fn scope<'a>(&self, context: &ScopeContext<'a>) -> Scope<'a>;
}

/// Local declarations, then dependency exports, then the global index.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScopeProvider;

impl ScopeProvider for DefaultScopeProvider {
    fn scope<'a>(&self, context: &ScopeContext<'a>) -> Scope<'a> {
        let reference = context.reference;
        let mut scope = Scope::new(
            reference.target_type.as_str(),
            context.grammar,
            context.case_insensitive,
        );
        let container = reference.container;
        scope.push_level(context.locals.declared_in(container));
        for ancestor in context.ast.ancestors(container) {
            scope.push_level(context.locals.declared_in(ancestor));
        }
        for &dependency in context.dependencies {
            if dependency != context.document {
                scope.push_level(context.index.exports(dependency));
            }
        }
        for (_, exports) in context.index.all_exports() {
            scope.push_level(exports);
        }
        scope
    }
}
