//! Names, scopes, linking and validation.
//!
//! The semantic layer runs after parsing, in two phases per document:
//!
//! - **Index**: [`compute_exports`] and [`LocalSymbols::compute`] record
//!   the named nodes of one AST without resolving anything. Pure per
//!   document, so the workspace runs it in parallel.
//! - **Link**: the [`Linker`] resolves each cross-reference slot through
//!   the [`Scope`] a [`ScopeProvider`] builds for it.
//!
//! Problems found on the way become [`Diagnostic`]s; nothing here fails.

mod diagnostics;
mod index;
mod linker;
mod names;
mod scope;
mod validation;

pub use diagnostics::{Diagnostic, DiagnosticSource, Severity, codes, sort_diagnostics};
pub use index::{
    ExportPolicy, IndexManager, ReferenceDescription, SymbolDescription, compute_exports,
    describe_references,
};
pub use linker::{LinkOutcome, Linker, ReferenceCase};
pub use names::{DefaultNameProvider, NameProvider, PropertyNameProvider};
pub use scope::{DefaultScopeProvider, LocalSymbols, Scope, ScopeContext, ScopeProvider};
pub use validation::{ValidationAcceptor, ValidationCheck, ValidationRegistry};

pub(crate) use validation::panic_message;
