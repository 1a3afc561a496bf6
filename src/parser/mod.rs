//! Grammar-driven lexer and parser
//!
//! This module turns text into a lossless CST plus an AST, driven entirely
//! by a compiled [`Grammar`](crate::grammar::Grammar):
//! - **regex** terminal patterns and the keyword list for lexing
//! - **rowan** for the CST (Concrete Syntax Tree)
//!
//! ## Architecture
//!
//! ```text
//! Source Text
//!     ↓
//! Lexer → Tokens (keywords, terminals, hidden trivia, error spans)
//!     ↓
//! TreeParser → GreenNode tree + AST arena + cross-reference slots
//!     ↓
//! SyntaxNode (rowan) → CST with parent pointers
//! ```

pub mod errors;
mod lexer;
#[allow(clippy::module_inception)]
mod parser;
mod syntax_kind;
mod value;

pub use errors::{ErrorCode, SyntaxError};
pub use lexer::{LexResult, Lexer, Token, TokenKind};
pub use parser::{ParseOptions, parse, parse_on_current_stack, parse_with};
pub use syntax_kind::{GrammarLanguage, SyntaxElement, SyntaxKind, SyntaxNode, SyntaxToken};
pub use value::{convert_value, unquote};

/// Re-export rowan types for convenience
pub use rowan::{GreenNode, TextRange, TextSize};
