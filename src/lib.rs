//! # strand-base
//!
//! Core library for grammar-driven languages: grammar compilation, lexing,
//! error-tolerant parsing, cross-reference linking and incremental
//! workspace builds.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! project   → Directory loading into a workspace
//!   ↓
//! workspace → Documents, build states, dependency graph, parser workers
//!   ↓
//! semantic  → Names, scopes, index, linker, diagnostics, validation
//!   ↓
//! syntax    → AST arena, cross-reference slots, parse results
//!   ↓
//! parser    → Regex lexer, rule-driven tree parser with recovery
//!   ↓
//! grammar   → Grammar model, compilation, bootstrap grammar language
//!   ↓
//! base      → Primitives (DocumentId, LineIndex, Position/Span)
//! ```

// ============================================================================
// MODULES (dependency order: base → grammar → parser → syntax → semantic → workspace → project)
// ============================================================================

/// Foundation types: DocumentId, LineIndex, Position/Span
pub mod base;

/// Language configuration loaded from JSON
pub mod config;

/// Grammar model, compilation and the grammar language
pub mod grammar;

/// Lexer and tree parser
pub mod parser;

/// Syntax trees: AST arena and parse results
pub mod syntax;

/// Scopes, linking, index and diagnostics
pub mod semantic;

/// Documents and the build orchestrator
pub mod workspace;

/// Workspace loading from disk
pub mod project;

// Re-export foundation types
pub use base::{DocumentId, LineIndex, Position, Span, TextRange, TextSize};

// Re-export the main entry points
pub use config::{BuildOptions, ConfigError, LanguageConfig};
pub use grammar::{Grammar, GrammarError};
pub use parser::{ParseOptions, parse, parse_on_current_stack, parse_with};
pub use semantic::{Diagnostic, Severity};
pub use syntax::{Ast, NodeRef, ParseResult};
pub use workspace::{
    BuildOutcome, BuildReport, BuildState, Document, Language, SharedWorkspace, Workspace,
};
