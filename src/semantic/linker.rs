//! Cross-reference linking.
//!
//! Only the linker writes resolution cells. Linking first computes every
//! resolution against an immutable view of the document, then writes them
//! in one pass, so the scope of a later reference never depends on how an
//! earlier one was resolved.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::base::DocumentId;
use crate::grammar::Grammar;
use crate::syntax::{Ast, RefId, Resolution};

use super::index::IndexManager;
use super::scope::{LocalSymbols, ScopeContext, ScopeProvider};

/// Counts from one linking pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkOutcome {
    pub resolved: usize,
    pub failed: usize,
}

/// How reference names compare against symbol names, per target type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCase {
    default: bool,
    by_type: FxHashMap<SmolStr, bool>,
}

impl ReferenceCase {
    pub fn sensitive() -> Self {
        Self::default()
    }

    pub fn insensitive() -> Self {
        Self {
            default: true,
            by_type: FxHashMap::default(),
        }
    }

    /// Overrides the default for references whose target type is `target_type`.
    pub fn with_type(mut self, target_type: impl Into<SmolStr>, insensitive: bool) -> Self {
        self.by_type.insert(target_type.into(), insensitive);
        self
    }

    pub fn is_insensitive(&self, target_type: &str) -> bool {
        self.by_type.get(target_type).copied().unwrap_or(self.default)
    }

    pub fn overridden_types(&self) -> impl Iterator<Item = &SmolStr> {
        self.by_type.keys()
    }
}

impl From<bool> for ReferenceCase {
    fn from(insensitive: bool) -> Self {
        if insensitive { Self::insensitive() } else { Self::sensitive() }
    }
}

pub struct Linker<'a> {
    grammar: &'a Grammar,
    scopes: &'a dyn ScopeProvider,
    case: ReferenceCase,
}

impl<'a> Linker<'a> {
    pub fn new(
        grammar: &'a Grammar,
        scopes: &'a dyn ScopeProvider,
        case: impl Into<ReferenceCase>,
    ) -> Self {
        Self {
            grammar,
            scopes,
            case: case.into(),
        }
    }

    /// Resolves every `Unresolved` slot of `ast`, in document order.
    ///
    /// Slots that are already resolved or failed are left alone, which
    /// makes linking an unchanged document a no-op.
    pub fn link(
        &self,
        document: DocumentId,
        ast: &mut Ast,
        locals: &LocalSymbols,
        index: &IndexManager,
        dependencies: &[DocumentId],
    ) -> LinkOutcome {
        let view: &Ast = ast;
        let resolutions: Vec<(RefId, Resolution)> = view
            .references()
            .filter(|(_, reference)| reference.resolution == Resolution::Unresolved)
            .map(|(id, reference)| {
                let context = ScopeContext {
                    document,
                    ast: view,
                    reference,
                    locals,
                    index,
                    dependencies,
                    grammar: self.grammar,
                    case_insensitive: self.case.is_insensitive(&reference.target_type),
                };
                let resolution = match self.scopes.scope(&context).lookup(&reference.text) {
                    Some(symbol) => Resolution::Resolved(symbol.target),
                    None => Resolution::Failed(format!(
                        "Could not resolve reference to {} named '{}'.",
                        reference.target_type, reference.text
                    )),
                };
                tracing::trace!(%document, text = %reference.text, ?resolution, "linked reference");
                (id, resolution)
            })
            .collect();

        let mut outcome = LinkOutcome::default();
        for (id, resolution) in resolutions {
            match resolution {
                Resolution::Resolved(_) => outcome.resolved += 1,
                Resolution::Failed(_) => outcome.failed += 1,
                Resolution::Unresolved => {}
            }
            ast.reference_mut(id).resolution = resolution;
        }
        outcome
    }

    /// Resets every slot so the next [`Linker::link`] resolves from scratch.
    pub fn unlink(ast: &mut Ast) {
        ast.reset_references();
    }
}
